pub mod api_sports;
pub mod provider;
pub mod sample;
pub mod understat;

pub use provider::{MatchDataSource, XgSource};
pub use sample::SampleData;

use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::info;
use url::Url;

use crate::cache::ExpiringCache;
use crate::config::Config;
use crate::models::{LeagueCode, XgSnapshot};

/// Connection and retry settings for [`RemoteDataClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Base URL of the credential-holding intermediary (fixtures/odds)
    pub proxy_base: String,
    /// Base URL of the stats site serving per-league pages
    pub stats_base: String,
    /// Season used for xG pages and league-scoped fixture queries
    pub season: String,
    /// Retries after a 429 before giving up
    pub max_retries: u32,
    /// Fixed pause before each retry
    pub retry_delay: Duration,
    /// Upper bound on odds pages followed per request
    pub odds_max_pages: u32,
    pub request_timeout: Duration,
}

impl ClientSettings {
    pub fn from_config(config: &Config) -> Self {
        ClientSettings {
            proxy_base: config.proxy_url.clone(),
            stats_base: config.stats_url.clone(),
            season: config.season.clone(),
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            odds_max_pages: config.odds_max_pages,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

/// Client for both upstreams. Every read goes through the expiring cache.
#[derive(Clone)]
pub struct RemoteDataClient {
    http: Client,
    cache: ExpiringCache,
    proxy_base: String,
    stats_base: Url,
    season: String,
    max_retries: u32,
    retry_delay: Duration,
    odds_max_pages: u32,
}

impl RemoteDataClient {
    pub fn new(settings: ClientSettings, cache: ExpiringCache) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(concat!("xg-value-scout/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        let stats_base = Url::parse(&settings.stats_base)
            .with_context(|| format!("Invalid stats URL: {}", settings.stats_base))?;
        if stats_base.cannot_be_a_base() {
            anyhow::bail!("Stats URL cannot be used as a base: {}", settings.stats_base);
        }
        Ok(RemoteDataClient {
            http,
            cache,
            proxy_base: settings.proxy_base.trim_end_matches('/').to_string(),
            stats_base,
            season: settings.season,
            max_retries: settings.max_retries,
            retry_delay: settings.retry_delay,
            odds_max_pages: settings.odds_max_pages.max(1),
        })
    }

    pub fn season(&self) -> &str {
        &self.season
    }
}

/// Fetch every publishing league's xG table concurrently and join them.
/// A failing league simply ends up absent from the snapshot.
pub async fn fetch_all_league_xg(source: &dyn XgSource, season: &str) -> XgSnapshot {
    let fetches = LeagueCode::XG_LEAGUES
        .iter()
        .map(|&league| async move { (league, source.fetch_league_xg(league, season).await) });
    let results = futures_util::future::join_all(fetches).await;

    let mut snapshot = XgSnapshot::default();
    for (league, table) in results {
        snapshot.insert(league, table);
    }
    info!(
        "xG tables loaded for {}/{} leagues (season {})",
        snapshot.len(),
        LeagueCode::XG_LEAGUES.len(),
        season
    );
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LeagueXgTable, TeamXg};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a one-row table for every league except Serie A.
    struct PartialXg {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl XgSource for PartialXg {
        async fn fetch_league_xg(&self, league: LeagueCode, _season: &str) -> Option<LeagueXgTable> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if league == LeagueCode::SerieA {
                return None;
            }
            Some(LeagueXgTable {
                teams: vec![TeamXg { title: league.to_string(), xg: Some(1.0) }],
            })
        }
    }

    #[tokio::test]
    async fn test_one_failing_league_does_not_block_others() {
        let source = PartialXg { calls: AtomicUsize::new(0) };
        let snapshot = fetch_all_league_xg(&source, "2024").await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 5);
        assert_eq!(snapshot.len(), 4);
        assert!(snapshot.table(LeagueCode::SerieA).is_none());
        assert!(snapshot.table(LeagueCode::Epl).is_some());
        assert!(snapshot.table(LeagueCode::Ucl).is_none());
    }

    /// Every league waits until all five fetches are in flight.
    struct RendezvousXg {
        barrier: tokio::sync::Barrier,
    }

    #[async_trait]
    impl XgSource for RendezvousXg {
        async fn fetch_league_xg(&self, league: LeagueCode, _season: &str) -> Option<LeagueXgTable> {
            self.barrier.wait().await;
            Some(LeagueXgTable {
                teams: vec![TeamXg { title: league.to_string(), xg: None }],
            })
        }
    }

    #[tokio::test]
    async fn test_league_fetches_run_concurrently() {
        let source = RendezvousXg {
            barrier: tokio::sync::Barrier::new(LeagueCode::XG_LEAGUES.len()),
        };
        let snapshot = tokio::time::timeout(
            Duration::from_secs(5),
            fetch_all_league_xg(&source, "2024"),
        )
        .await
        .expect("all league fetches should be in flight together");
        assert_eq!(snapshot.len(), 5);
    }

    #[test]
    fn test_rejects_non_base_stats_url() {
        let settings = ClientSettings {
            proxy_base: "http://127.0.0.1:1/proxy/".into(),
            stats_base: "mailto:stats@example.com".into(),
            season: "2024".into(),
            max_retries: 2,
            retry_delay: Duration::from_millis(1),
            odds_max_pages: 1,
            request_timeout: Duration::from_secs(1),
        };
        let cache = ExpiringCache::memory_only(Duration::from_secs(60));
        assert!(RemoteDataClient::new(settings, cache).is_err());
    }
}
