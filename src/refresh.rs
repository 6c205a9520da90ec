//! One user-triggered refresh: xG fan-out, fixtures ∥ odds, enrich, present.
//!
//! Each refresh runs against its own [`RefreshContext`] (sequence number and
//! xG snapshot) instead of shared mutable state. Overlapping refreshes are
//! not cancelled; the coordinator only publishes a result if no newer
//! refresh has started since, so the latest request wins.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::models::{Fixture, OddsEntry, XgSnapshot};
use crate::presenter::{render_matches, LeagueFilter, Presentation};
use crate::sources::{fetch_all_league_xg, MatchDataSource, SampleData, XgSource};

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshRequest {
    pub date: NaiveDate,
    pub min_value: f64,
    pub league: LeagueFilter,
    /// Fall back to the built-in dataset if the live sources fail
    pub use_sample: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RefreshStatus {
    Live { fixtures: usize },
    SampleFallback { message: String },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshOutcome {
    pub seq: u64,
    pub date: NaiveDate,
    pub min_value: f64,
    pub league: LeagueFilter,
    pub status: RefreshStatus,
    /// `None` when the refresh failed outright
    pub presentation: Option<Presentation>,
    /// A newer refresh started before this one finished; not published
    pub superseded: bool,
}

/// Per-refresh state, created when the refresh starts and dropped when it
/// ends.
pub struct RefreshContext {
    pub seq: u64,
    pub xg: XgSnapshot,
}

pub struct RefreshCoordinator {
    xg_source: Arc<dyn XgSource>,
    data_source: Arc<dyn MatchDataSource>,
    fallback: Arc<dyn MatchDataSource>,
    season: String,
    latest_seq: AtomicU64,
    latest: RwLock<Option<RefreshOutcome>>,
}

impl RefreshCoordinator {
    pub fn new(
        xg_source: Arc<dyn XgSource>,
        data_source: Arc<dyn MatchDataSource>,
        season: &str,
    ) -> Self {
        RefreshCoordinator {
            xg_source,
            data_source,
            fallback: Arc::new(SampleData),
            season: season.to_string(),
            latest_seq: AtomicU64::new(0),
            latest: RwLock::new(None),
        }
    }

    /// Most recently published outcome.
    pub async fn latest(&self) -> Option<RefreshOutcome> {
        self.latest.read().await.clone()
    }

    /// Run a full refresh and publish it unless a newer one has started.
    pub async fn refresh(&self, req: RefreshRequest) -> RefreshOutcome {
        let seq = self.latest_seq.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            "Refresh #{} started via {} (date={}, min_value={}, league={})",
            seq,
            self.data_source.name(),
            req.date,
            req.min_value,
            req.league
        );

        let ctx = RefreshContext {
            seq,
            xg: fetch_all_league_xg(self.xg_source.as_ref(), &self.season).await,
        };

        let (status, presentation) = match self.load_live(&req).await {
            Ok((fixtures, odds)) => {
                let presentation =
                    render_matches(&fixtures, &odds, &ctx.xg, req.min_value, req.league);
                info!(
                    "Refresh #{}: {} fixtures, {} shown",
                    ctx.seq,
                    fixtures.len(),
                    presentation.cards().len()
                );
                (
                    RefreshStatus::Live {
                        fixtures: fixtures.len(),
                    },
                    Some(presentation),
                )
            }
            Err(e) if req.use_sample => {
                warn!("Refresh #{}: live data failed ({}), showing sample data", ctx.seq, e);
                (
                    RefreshStatus::SampleFallback {
                        message: e.to_string(),
                    },
                    Some(self.sample_presentation(req.date).await),
                )
            }
            Err(e) => {
                match e.status() {
                    Some(status) => error!("Refresh #{} failed with HTTP {}: {}", ctx.seq, status, e),
                    None => error!("Refresh #{} failed: {}", ctx.seq, e),
                }
                (
                    RefreshStatus::Failed {
                        message: e.to_string(),
                    },
                    None,
                )
            }
        };

        let mut outcome = RefreshOutcome {
            seq: ctx.seq,
            date: req.date,
            min_value: req.min_value,
            league: req.league,
            status,
            presentation,
            superseded: false,
        };
        outcome.superseded = !self.publish(&outcome).await;
        outcome
    }

    async fn load_live(
        &self,
        req: &RefreshRequest,
    ) -> Result<(Vec<Fixture>, Vec<OddsEntry>), crate::error::ProxyRequestError> {
        // The whole day is fetched; the league filter applies at presentation
        tokio::try_join!(
            self.data_source.fetch_fixtures(req.date),
            self.data_source.fetch_odds(req.date),
        )
    }

    /// The built-in dataset, unfiltered.
    pub async fn sample_presentation(&self, date: NaiveDate) -> Presentation {
        let fixtures = self.fallback.fetch_fixtures(date).await.unwrap_or_default();
        let odds = self.fallback.fetch_odds(date).await.unwrap_or_default();
        render_matches(
            &fixtures,
            &odds,
            &XgSnapshot::default(),
            f64::NEG_INFINITY,
            LeagueFilter::All,
        )
    }

    /// Store `outcome` as the latest unless a newer refresh has begun.
    async fn publish(&self, outcome: &RefreshOutcome) -> bool {
        let mut slot = self.latest.write().await;
        if self.latest_seq.load(Ordering::SeqCst) != outcome.seq {
            debug!("Refresh #{} superseded; result discarded", outcome.seq);
            return false;
        }
        *slot = Some(outcome.clone());
        true
    }
}
