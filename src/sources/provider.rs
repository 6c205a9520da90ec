use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::ProxyRequestError;
use crate::models::{Fixture, LeagueCode, LeagueXgTable, OddsEntry};

/// Load-bearing source of fixtures and match-winner odds.
#[async_trait]
pub trait MatchDataSource: Send + Sync {
    /// Not-started fixtures on `date`, across all leagues.
    async fn fetch_fixtures(&self, date: NaiveDate) -> Result<Vec<Fixture>, ProxyRequestError>;

    /// Odds entries for fixtures on `date`.
    async fn fetch_odds(&self, date: NaiveDate) -> Result<Vec<OddsEntry>, ProxyRequestError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// Best-effort source of seasonal xG tables. `None` means "no xG for this
/// league right now", never a hard failure.
#[async_trait]
pub trait XgSource: Send + Sync {
    async fn fetch_league_xg(&self, league: LeagueCode, season: &str) -> Option<LeagueXgTable>;
}
