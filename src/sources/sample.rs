//! Fixed built-in dataset shown in sample mode or when the live sources are
//! unreachable and sample mode is on.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};

use super::api_sports::{parse_fixtures_response, parse_odds_response};
use super::provider::MatchDataSource;
use crate::error::ProxyRequestError;
use crate::models::{Fixture, OddsEntry};

fn sample_fixtures_json() -> Value {
    json!({ "response": [
        {
            "fixture": { "id": 1, "date": "2025-10-20" },
            "league": { "name": "England - Premier League" },
            "teams": { "home": { "name": "Team A", "logo": "" }, "away": { "name": "Team B", "logo": "" } }
        },
        {
            "fixture": { "id": 2, "date": "2025-10-20" },
            "league": { "name": "Germany - Bundesliga" },
            "teams": { "home": { "name": "Team C", "logo": "" }, "away": { "name": "Team D", "logo": "" } }
        }
    ]})
}

fn sample_odds_json() -> Value {
    json!({ "response": [
        {
            "fixture": { "id": 1 },
            "bookmakers": [{ "bets": [{ "name": "Match Winner", "values": [
                { "value": "Home", "odd": "1.90" },
                { "value": "Draw", "odd": "3.60" },
                { "value": "Away", "odd": "4.10" }
            ]}]}]
        },
        {
            "fixture": { "id": 2 },
            "bookmakers": [{ "bets": [{ "name": "Match Winner", "values": [
                { "value": "Home", "odd": "2.50" },
                { "value": "Draw", "odd": "3.10" },
                { "value": "Away", "odd": "2.80" }
            ]}]}]
        }
    ]})
}

pub fn sample_fixtures() -> Vec<Fixture> {
    parse_fixtures_response(&sample_fixtures_json())
}

pub fn sample_odds() -> Vec<OddsEntry> {
    parse_odds_response(&sample_odds_json())
}

/// Serves the built-in dataset regardless of date.
pub struct SampleData;

#[async_trait]
impl MatchDataSource for SampleData {
    async fn fetch_fixtures(&self, _date: NaiveDate) -> Result<Vec<Fixture>, ProxyRequestError> {
        Ok(sample_fixtures())
    }

    async fn fetch_odds(&self, _date: NaiveDate) -> Result<Vec<OddsEntry>, ProxyRequestError> {
        Ok(sample_odds())
    }

    fn name(&self) -> &str {
        "sample"
    }
}
