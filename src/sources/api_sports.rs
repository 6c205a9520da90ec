use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use super::provider::MatchDataSource;
use super::RemoteDataClient;
use crate::error::ProxyRequestError;
use crate::models::{Bet, Bookmaker, Fixture, OddQuote, OddsEntry, Team};

/// Cache key for a proxied path: `/`, `?`, `=` and `&` become `_`.
pub fn proxy_cache_key(path: &str) -> String {
    format!("proxy_{}", path.replace(['/', '?', '=', '&'], "_"))
}

/// Not-started fixtures for the whole day. League filtering happens after
/// enrichment, never upstream.
pub fn fixtures_path(date: NaiveDate) -> String {
    format!("/fixtures?date={}&status=NS", date.format("%Y-%m-%d"))
}

pub fn odds_path(date: NaiveDate) -> String {
    format!("/odds?date={}", date.format("%Y-%m-%d"))
}

impl RemoteDataClient {
    /// GET `path` through the intermediary, cache-through.
    ///
    /// A `429` is retried after the fixed delay while `retries_remaining`
    /// lasts; any other non-success status fails immediately.
    pub async fn fetch_via_proxy(
        &self,
        path: &str,
        retries_remaining: u32,
    ) -> Result<Value, ProxyRequestError> {
        let key = proxy_cache_key(path);
        if let Some(hit) = self.cache.get::<Value>(&key) {
            return Ok(hit);
        }

        let url = format!("{}{}", self.proxy_base, path);
        let mut retries_remaining = retries_remaining;
        loop {
            debug!("Proxy GET {}", url);
            let resp = self
                .http
                .get(&url)
                .header(ACCEPT, "application/json")
                .send()
                .await?;

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS && retries_remaining > 0 {
                warn!(
                    "Rate limited on {} – retrying in {:?} ({} retries left)",
                    path, self.retry_delay, retries_remaining
                );
                tokio::time::sleep(self.retry_delay).await;
                retries_remaining -= 1;
                continue;
            }
            if !status.is_success() {
                return Err(ProxyRequestError::Status {
                    status: status.as_u16(),
                });
            }

            let body = resp.text().await?;
            let payload: Value = serde_json::from_str(&body)?;
            self.cache.set(&key, &payload);
            return Ok(payload);
        }
    }

    pub async fn fetch_fixtures(&self, date: NaiveDate) -> Result<Vec<Fixture>, ProxyRequestError> {
        let path = fixtures_path(date);
        let raw = self.fetch_via_proxy(&path, self.max_retries).await?;
        Ok(parse_fixtures_response(&raw))
    }

    /// Odds for `date`, following upstream paging up to the configured
    /// page limit. Each page is cached on its own.
    pub async fn fetch_odds(&self, date: NaiveDate) -> Result<Vec<OddsEntry>, ProxyRequestError> {
        let path = odds_path(date);
        let first = self.fetch_via_proxy(&path, self.max_retries).await?;
        let mut entries = parse_odds_response(&first);

        let total_pages = paging_total(&first);
        if total_pages > self.odds_max_pages {
            debug!(
                "Odds for {} span {} pages; reading the first {}",
                date, total_pages, self.odds_max_pages
            );
        }
        for page in 2..=total_pages.min(self.odds_max_pages) {
            let paged = format!("{}&page={}", path, page);
            let raw = self.fetch_via_proxy(&paged, self.max_retries).await?;
            entries.extend(parse_odds_response(&raw));
        }
        Ok(entries)
    }
}

#[async_trait]
impl MatchDataSource for RemoteDataClient {
    async fn fetch_fixtures(&self, date: NaiveDate) -> Result<Vec<Fixture>, ProxyRequestError> {
        RemoteDataClient::fetch_fixtures(self, date).await
    }

    async fn fetch_odds(&self, date: NaiveDate) -> Result<Vec<OddsEntry>, ProxyRequestError> {
        RemoteDataClient::fetch_odds(self, date).await
    }

    fn name(&self) -> &str {
        "API-Football"
    }
}

// ── Parsing helpers ────────────────────────────────────────────────────────────

fn response_items(raw: &Value) -> &[Value] {
    raw["response"].as_array().map(Vec::as_slice).unwrap_or(&[])
}

fn paging_total(raw: &Value) -> u32 {
    raw["paging"]["total"]
        .as_u64()
        .map(|t| t.clamp(1, u32::MAX as u64) as u32)
        .unwrap_or(1)
}

/// Fixtures from a `{response: [...]}` envelope. Items without an ID or
/// team names are skipped.
pub fn parse_fixtures_response(raw: &Value) -> Vec<Fixture> {
    response_items(raw)
        .iter()
        .filter_map(|item| {
            let id = item["fixture"]["id"].as_u64()?;
            let date = item["fixture"]["date"].as_str().unwrap_or("").to_string();
            let league = &item["league"];
            Some(Fixture {
                id,
                date,
                league_name: league["name"].as_str().unwrap_or("").to_string(),
                league_country: league["country"].as_str().map(str::to_string),
                league_id: league["id"].as_u64().and_then(|v| u32::try_from(v).ok()),
                home: parse_team(&item["teams"]["home"])?,
                away: parse_team(&item["teams"]["away"])?,
            })
        })
        .collect()
}

fn parse_team(raw: &Value) -> Option<Team> {
    Some(Team {
        name: raw["name"].as_str()?.to_string(),
        logo: raw["logo"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    })
}

/// Odds entries from a `{response: [...]}` envelope.
pub fn parse_odds_response(raw: &Value) -> Vec<OddsEntry> {
    response_items(raw)
        .iter()
        .filter_map(|item| {
            let fixture_id = item["fixture"]["id"].as_u64()?;
            let bookmakers = item["bookmakers"]
                .as_array()
                .map(|bms| bms.iter().map(parse_bookmaker).collect())
                .unwrap_or_default();
            Some(OddsEntry {
                fixture_id,
                bookmakers,
            })
        })
        .collect()
}

fn parse_bookmaker(raw: &Value) -> Bookmaker {
    let bets = raw["bets"]
        .as_array()
        .map(|bets| {
            bets.iter()
                .filter_map(|bet| {
                    let name = bet["name"].as_str()?.to_string();
                    let values = bet["values"]
                        .as_array()
                        .map(|vals| vals.iter().map(parse_quote).collect())
                        .unwrap_or_default();
                    Some(Bet { name, values })
                })
                .collect()
        })
        .unwrap_or_default();
    Bookmaker {
        name: raw["name"].as_str().map(str::to_string),
        bets,
    }
}

fn parse_quote(raw: &Value) -> OddQuote {
    // Odds come as strings ("1.90") from the API but numbers are accepted too
    let odd = match &raw["odd"] {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    };
    OddQuote {
        value: raw["value"].as_str().unwrap_or("").to_string(),
        odd,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{client_for, serve};
    use axum::{extract::Query, http::StatusCode, routing::get, Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 20).unwrap()
    }

    fn counting_route(status: StatusCode, body: Value) -> (Router, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/api/fixtures",
            get(move || {
                let counter = counter.clone();
                let body = body.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (status, Json(body))
                }
            }),
        );
        (router, hits)
    }

    #[test]
    fn test_paths_and_cache_keys() {
        assert_eq!(fixtures_path(date()), "/fixtures?date=2025-10-20&status=NS");
        assert_eq!(odds_path(date()), "/odds?date=2025-10-20");
        assert_eq!(
            proxy_cache_key("/fixtures?date=2025-10-20&status=NS"),
            "proxy__fixtures_date_2025-10-20_status_NS"
        );
    }

    #[test]
    fn test_parse_fixtures_response() {
        let raw = json!({
            "response": [
                {
                    "fixture": { "id": 1035, "date": "2025-10-20T19:00:00+00:00" },
                    "league": { "id": 39, "name": "Premier League", "country": "England" },
                    "teams": {
                        "home": { "name": "Arsenal", "logo": "https://media/42.png" },
                        "away": { "name": "Chelsea", "logo": "" }
                    }
                },
                { "fixture": { "id": 1036 }, "teams": { "home": {} } }
            ]
        });
        let fixtures = parse_fixtures_response(&raw);
        assert_eq!(fixtures.len(), 1);
        let f = &fixtures[0];
        assert_eq!(f.id, 1035);
        assert_eq!(f.league_id, Some(39));
        assert_eq!(f.league_country.as_deref(), Some("England"));
        assert_eq!(f.home.logo.as_deref(), Some("https://media/42.png"));
        assert_eq!(f.away.logo, None);
    }

    #[test]
    fn test_parse_odds_accepts_string_and_number_odds() {
        let raw = json!({
            "response": [{
                "fixture": { "id": 1 },
                "bookmakers": [{
                    "name": "Bet365",
                    "bets": [{ "name": "Match Winner", "values": [
                        { "value": "Home", "odd": "1.90" },
                        { "value": "Draw", "odd": 3.6 },
                        { "value": "Away" }
                    ]}]
                }]
            }, { "bookmakers": [] }]
        });
        let entries = parse_odds_response(&raw);
        assert_eq!(entries.len(), 1);
        let bet = entries[0].match_winner().unwrap();
        let odds: Vec<&str> = bet.values.iter().map(|q| q.odd.as_str()).collect();
        assert_eq!(odds, vec!["1.90", "3.6", ""]);
    }

    #[test]
    fn test_out_of_range_league_id_is_dropped() {
        let raw = json!({ "response": [{
            "fixture": { "id": 3, "date": "2025-10-20" },
            "league": { "id": 4_294_967_335u64, "name": "Premier League" },
            "teams": { "home": { "name": "A" }, "away": { "name": "B" } }
        }]});
        let fixtures = parse_fixtures_response(&raw);
        assert_eq!(fixtures.len(), 1);
        assert_eq!(fixtures[0].league_id, None);
    }

    #[test]
    fn test_missing_response_is_empty() {
        assert!(parse_fixtures_response(&json!({ "errors": ["boom"] })).is_empty());
        assert!(parse_odds_response(&json!(null)).is_empty());
    }

    #[tokio::test]
    async fn test_success_is_cached() {
        let (router, hits) = counting_route(StatusCode::OK, json!({ "response": [] }));
        let base = serve(router).await;
        let client = client_for(&format!("{}/api/", base), "http://127.0.0.1:9/");

        let first = client.fetch_via_proxy("/fixtures", 2).await.unwrap();
        let second = client.fetch_via_proxy("/fixtures", 2).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_exhausts_retries() {
        let (router, hits) = counting_route(StatusCode::TOO_MANY_REQUESTS, json!({}));
        let base = serve(router).await;
        let client = client_for(&format!("{}/api", base), "http://127.0.0.1:9/");

        let err = client.fetch_via_proxy("/fixtures", 2).await.unwrap_err();
        assert!(matches!(err, ProxyRequestError::Status { status: 429 }));
        assert_eq!(err.status(), Some(429));
        // One initial attempt plus two retries
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_then_success() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/api/odds",
            get(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        (StatusCode::TOO_MANY_REQUESTS, Json(json!({})))
                    } else {
                        (StatusCode::OK, Json(json!({ "response": [] })))
                    }
                }
            }),
        );
        let base = serve(router).await;
        let client = client_for(&format!("{}/api", base), "http://127.0.0.1:9/");

        let payload = client.fetch_via_proxy("/odds", 2).await.unwrap();
        assert_eq!(payload, json!({ "response": [] }));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_other_errors_fail_without_retry() {
        let (router, hits) = counting_route(StatusCode::INTERNAL_SERVER_ERROR, json!({}));
        let base = serve(router).await;
        let client = client_for(&format!("{}/api", base), "http://127.0.0.1:9/");

        let err = client.fetch_via_proxy("/fixtures", 2).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unparsable_body_is_an_error() {
        let router = Router::new().route("/api/fixtures", get(|| async { "<html>" }));
        let base = serve(router).await;
        let client = client_for(&format!("{}/api", base), "http://127.0.0.1:9/");

        let err = client.fetch_via_proxy("/fixtures", 0).await.unwrap_err();
        assert!(matches!(err, ProxyRequestError::Payload(_)));
    }

    #[tokio::test]
    async fn test_fetch_odds_follows_paging() {
        let router = Router::new().route(
            "/api/odds",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                let page: u64 = q.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
                Json(json!({
                    "paging": { "current": page, "total": 4 },
                    "response": [{ "fixture": { "id": page }, "bookmakers": [] }]
                }))
            }),
        );
        let base = serve(router).await;
        let client = client_for(&format!("{}/api", base), "http://127.0.0.1:9/");

        // Four pages upstream, three allowed
        let entries = client.fetch_odds(date()).await.unwrap();
        let ids: Vec<u64> = entries.iter().map(|e| e.fixture_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_fetch_fixtures_sends_query() {
        let router = Router::new().route(
            "/api/fixtures",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(q.get("status").map(String::as_str), Some("NS"));
                assert_eq!(q.get("date").map(String::as_str), Some("2025-10-20"));
                assert!(!q.contains_key("league"));
                assert!(!q.contains_key("season"));
                Json(json!({ "response": [{
                    "fixture": { "id": 5, "date": "2025-10-20" },
                    "league": { "name": "Premier League", "country": "England" },
                    "teams": { "home": { "name": "A" }, "away": { "name": "B" } }
                }]}))
            }),
        );
        let base = serve(router).await;
        let client = client_for(&format!("{}/api", base), "http://127.0.0.1:9/");

        let fixtures = client.fetch_fixtures(date()).await.unwrap();
        assert_eq!(fixtures.len(), 1);
        assert_eq!(fixtures[0].id, 5);
    }

    #[tokio::test]
    async fn test_unreachable_proxy_is_transport_error() {
        let client = client_for("http://127.0.0.1:9", "http://127.0.0.1:9/");
        let err = client.fetch_fixtures(date()).await.unwrap_err();
        assert!(matches!(err, ProxyRequestError::Transport(_)));
    }
}
