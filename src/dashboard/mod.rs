pub mod proxy;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::presenter::LeagueFilter;
use crate::refresh::{RefreshCoordinator, RefreshRequest};

pub use proxy::UpstreamProxy;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<RefreshCoordinator>,
    /// Initial state of the sample toggle in the page
    pub sample_default: bool,
}

/// Build the Axum router for the dashboard. The `/proxy` route is only
/// mounted when an upstream proxy is configured.
pub fn router(state: AppState, proxy: Option<UpstreamProxy>) -> Router {
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/api/matches", get(matches_handler))
        .route("/api/latest", get(latest_handler))
        .route("/api/sample", get(sample_handler))
        .with_state(Arc::new(state));

    let app = match proxy {
        Some(p) => app.merge(proxy::router(p)),
        None => app,
    };
    app.layer(CorsLayer::permissive())
}

/// Serve the dashboard page with today's date and the sample flag injected.
async fn index_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let html = DASHBOARD_HTML.replace(
        r#"<body>"#,
        &format!(
            r#"<body data-sample="{}" data-today="{}">"#,
            state.sample_default,
            Utc::now().date_naive()
        ),
    );
    Html(html)
}

#[derive(Debug, Default, Deserialize)]
pub struct MatchesQuery {
    pub date: Option<String>,
    pub min_value: Option<f64>,
    pub league: Option<String>,
    pub sample: Option<bool>,
}

impl MatchesQuery {
    fn into_request(self, sample_default: bool) -> Result<RefreshRequest, String> {
        let date = match self.date.as_deref().map(str::trim) {
            None | Some("") => Utc::now().date_naive(),
            Some(d) => NaiveDate::parse_from_str(d, "%Y-%m-%d")
                .map_err(|_| format!("invalid date: {}", d))?,
        };
        let min_value = self.min_value.unwrap_or(0.0);
        if !min_value.is_finite() {
            return Err("min_value must be a finite number".to_string());
        }
        let league: LeagueFilter = self
            .league
            .as_deref()
            .unwrap_or("all")
            .parse()
            .map_err(|e: anyhow::Error| e.to_string())?;
        Ok(RefreshRequest {
            date,
            min_value,
            league,
            use_sample: self.sample.unwrap_or(sample_default),
        })
    }
}

/// GET /api/matches?date=YYYY-MM-DD&min_value=0.05&league=EPL&sample=true
async fn matches_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MatchesQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let req = query
        .into_request(state.sample_default)
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    Ok(Json(state.coordinator.refresh(req).await))
}

/// GET /api/latest
async fn latest_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.coordinator.latest().await)
}

/// GET /api/sample
async fn sample_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(
        state
            .coordinator
            .sample_presentation(Utc::now().date_naive())
            .await,
    )
}

/// Embedded single-file dashboard (HTML + CSS + JS)
const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>xG Value Scout</title>
<style>
  :root {
    --bg: #0f1117;
    --card: #1a1d27;
    --border: #2a2d3a;
    --accent: #6c63ff;
    --green: #00c896;
    --amber: #ffb020;
    --red: #ff4f6a;
    --text: #e0e0e0;
    --muted: #8888aa;
  }
  * { box-sizing: border-box; margin: 0; padding: 0; }
  body { background: var(--bg); color: var(--text); font-family: 'Segoe UI', system-ui, sans-serif; }
  header { display: flex; flex-wrap: wrap; align-items: center; gap: 1rem; padding: 1rem 2rem; border-bottom: 1px solid var(--border); }
  header h1 { font-size: 1.4rem; font-weight: 700; margin-right: auto; }
  .controls { display: flex; flex-wrap: wrap; gap: .75rem; align-items: center; }
  .controls label { color: var(--muted); font-size: .8rem; display: flex; gap: .4rem; align-items: center; }
  .controls input, .controls select { background: var(--card); color: var(--text); border: 1px solid var(--border); border-radius: 6px; padding: .35rem .5rem; }
  button { background: var(--accent); color: #fff; border: none; border-radius: 6px; padding: .45rem .9rem; font-weight: 600; cursor: pointer; }
  .badge { padding: .2rem .6rem; border-radius: 4px; font-size: .75rem; font-weight: 700; text-transform: uppercase; }
  .badge.live { background: var(--green); color: #000; }
  .badge.sample { background: #ff9800; color: #000; }
  .badge.failed { background: var(--red); color: #000; }
  main { padding: 1.5rem 2rem; }
  #status { color: var(--muted); font-size: .85rem; margin-bottom: 1rem; }
  #notice { color: var(--muted); text-align: center; padding: 2rem; }
  .grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(300px, 1fr)); gap: 1rem; }
  .match { background: var(--card); border: 1px solid var(--border); border-left: 4px solid var(--border); border-radius: 10px; padding: 1rem 1.2rem; }
  .match.value-high { border-left-color: var(--green); }
  .match.value-mid { border-left-color: var(--amber); }
  .match.value-low { border-left-color: var(--red); }
  .teams { display: flex; align-items: center; gap: .5rem; font-weight: 600; margin-bottom: .3rem; }
  .teams img { width: 22px; height: 22px; object-fit: contain; }
  .meta { color: var(--muted); font-size: .8rem; margin-bottom: .6rem; }
  .headline { font-size: 1.1rem; font-weight: 700; margin-bottom: .5rem; }
  table { width: 100%; border-collapse: collapse; }
  td { padding: .3rem 0; font-size: .88rem; border-bottom: 1px solid #1e2130; }
  td:last-child { text-align: right; }
  tr:last-child td { border-bottom: none; }
  .high { color: var(--green); }
  .mid { color: var(--amber); }
  .low { color: var(--red); }
  .xg { color: var(--muted); font-size: .8rem; margin-top: .6rem; }
</style>
</head>
<body>
<header>
  <h1>xG Value Scout</h1>
  <div class="controls">
    <label>Date <input type="date" id="date"></label>
    <label>Min value <input type="number" id="min-value" step="0.01" value="0"></label>
    <label>League
      <select id="league">
        <option value="all">All</option>
        <option value="EPL">Premier League</option>
        <option value="Bundesliga">Bundesliga</option>
        <option value="La_Liga">La Liga</option>
        <option value="Serie_A">Serie A</option>
        <option value="Ligue_1">Ligue 1</option>
        <option value="UCL">Champions League</option>
      </select>
    </label>
    <label><input type="checkbox" id="sample"> Sample data</label>
    <button id="refresh">Refresh</button>
  </div>
  <span class="badge" id="mode-badge"></span>
</header>
<main>
  <div id="status">Loading…</div>
  <div id="notice"></div>
  <div class="grid" id="cards"></div>
</main>
<script>
let requestSeq = 0;
let debounceTimer = null;

function esc(s) {
  return String(s ?? '').replace(/[&<>"']/g, c => ({ '&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;' }[c]));
}

function logo(url) {
  return url ? `<img src="${esc(url)}" alt="">` : '';
}

function renderCard(card) {
  const rows = card.outcomes.length
    ? card.outcomes.map(o => `<tr><td>${esc(o.label)}</td><td class="${o.tier}">${esc(o.value_pct)}</td></tr>`).join('')
    : '<tr><td>No odds available</td><td></td></tr>';
  return `<div class="match value-${card.tier}">
    <div class="teams">${logo(card.home_logo)}${esc(card.home)} vs ${esc(card.away)}${logo(card.away_logo)}</div>
    <div class="meta">${esc(card.kickoff)}</div>
    <div class="headline ${card.tier}">${esc(card.headline)}</div>
    <table>${rows}</table>
    <div class="xg">${esc(card.xg_line)}</div>
  </div>`;
}

const NOTICES = {
  no_fixtures: 'No matches for the selected date.',
  no_matches_for_filter: 'No matches for the current filter.',
};

function renderPresentation(p) {
  const cards = document.getElementById('cards');
  const notice = document.getElementById('notice');
  if (!p) {
    cards.innerHTML = '';
    notice.textContent = 'Could not load matches.';
    return;
  }
  notice.textContent = NOTICES[p.kind] || '';
  cards.innerHTML = (p.cards || []).map(renderCard).join('');
}

function setBadge(state) {
  const badge = document.getElementById('mode-badge');
  const labels = { live: 'Live', sample_fallback: 'Sample', failed: 'Error' };
  const classes = { live: 'live', sample_fallback: 'sample', failed: 'failed' };
  badge.textContent = labels[state] || '';
  badge.className = 'badge ' + (classes[state] || '');
}

async function refresh() {
  const mine = ++requestSeq;
  const params = new URLSearchParams({
    date: document.getElementById('date').value,
    min_value: document.getElementById('min-value').value || '0',
    league: document.getElementById('league').value,
    sample: document.getElementById('sample').checked,
  });
  document.getElementById('status').textContent = 'Loading…';
  try {
    const r = await fetch('/api/matches?' + params);
    if (mine !== requestSeq) return;
    if (!r.ok) {
      setBadge('failed');
      document.getElementById('status').textContent = await r.text();
      renderPresentation(null);
      return;
    }
    const out = await r.json();
    if (mine !== requestSeq) return;
    setBadge(out.status.state);
    const s = out.status;
    document.getElementById('status').textContent =
      s.state === 'live' ? `${s.fixtures} fixtures · updated ${new Date().toLocaleTimeString()}`
      : s.state === 'sample_fallback' ? `Live data unavailable (${s.message}); showing sample data`
      : `Refresh failed: ${s.message}`;
    renderPresentation(out.presentation);
  } catch (e) {
    if (mine !== requestSeq) return;
    setBadge('failed');
    document.getElementById('status').textContent = 'Request failed: ' + e;
    renderPresentation(null);
  }
}

function scheduleRefresh() {
  clearTimeout(debounceTimer);
  debounceTimer = setTimeout(refresh, 250);
}

document.addEventListener('DOMContentLoaded', () => {
  document.getElementById('date').value = document.body.dataset.today;
  document.getElementById('sample').checked = document.body.dataset.sample === 'true';
  ['date', 'min-value', 'league', 'sample'].forEach(id =>
    document.getElementById(id).addEventListener('change', scheduleRefresh));
  document.getElementById('refresh').addEventListener('click', scheduleRefresh);
  refresh();
});
</script>
</body>
</html>"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LeagueCode, LeagueXgTable};
    use crate::sources::{SampleData, XgSource};
    use crate::test_support::serve;
    use async_trait::async_trait;
    use serde_json::Value;

    struct NoXg;

    #[async_trait]
    impl XgSource for NoXg {
        async fn fetch_league_xg(&self, _league: LeagueCode, _season: &str) -> Option<LeagueXgTable> {
            None
        }
    }

    async fn dashboard() -> String {
        let coordinator = Arc::new(RefreshCoordinator::new(
            Arc::new(NoXg),
            Arc::new(SampleData),
            "2024",
        ));
        let state = AppState {
            coordinator,
            sample_default: false,
        };
        serve(router(state, None)).await
    }

    #[test]
    fn test_query_defaults() {
        let req = MatchesQuery::default().into_request(true).unwrap();
        assert_eq!(req.min_value, 0.0);
        assert_eq!(req.league, LeagueFilter::All);
        assert!(req.use_sample);
    }

    #[test]
    fn test_query_rejects_bad_input() {
        let bad_date = MatchesQuery {
            date: Some("20-10-2025".into()),
            ..Default::default()
        };
        assert!(bad_date.into_request(false).is_err());

        let bad_league = MatchesQuery {
            league: Some("MLS".into()),
            ..Default::default()
        };
        assert!(bad_league.into_request(false).is_err());
    }

    #[tokio::test]
    async fn test_index_injects_flags() {
        let url = dashboard().await;
        let html = reqwest::get(&url).await.unwrap().text().await.unwrap();
        assert!(html.contains(r#"data-sample="false""#));
        assert!(html.contains("xG Value Scout"));
    }

    #[tokio::test]
    async fn test_matches_then_latest() {
        let url = dashboard().await;

        let latest: Value = reqwest::get(format!("{}/api/latest", url))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(latest.is_null());

        let out: Value = reqwest::get(format!(
            "{}/api/matches?date=2025-10-20&min_value=-1&league=all",
            url
        ))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
        assert_eq!(out["status"]["state"], "live");
        assert_eq!(out["status"]["fixtures"], 2);
        assert_eq!(out["presentation"]["kind"], "cards");
        let cards = out["presentation"]["cards"].as_array().unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0]["home"], "Team A");
        assert_eq!(cards[0]["tier"], "low");

        let latest: Value = reqwest::get(format!("{}/api/latest", url))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(latest["seq"], out["seq"]);
    }

    #[tokio::test]
    async fn test_matches_filter_and_bad_request() {
        let url = dashboard().await;

        let out: Value = reqwest::get(format!(
            "{}/api/matches?date=2025-10-20&min_value=0&league=Bundesliga",
            url
        ))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
        assert_eq!(out["presentation"]["kind"], "no_matches_for_filter");

        let resp = reqwest::get(format!("{}/api/matches?league=MLS", url))
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn test_sample_endpoint() {
        let url = dashboard().await;
        let out: Value = reqwest::get(format!("{}/api/sample", url))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let cards = out["cards"].as_array().unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[1]["headline"], "Bundesliga · -7.4%");
        assert_eq!(cards[0]["xg_line"], "xG: N/A (H) | N/A (A)");
    }
}
