use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Name of the only bookmaker market the value engine consumes.
pub const MATCH_WINNER: &str = "Match Winner";

// ── Leagues ──────────────────────────────────────────────────────────────────

/// Closed set of competitions the scout understands.
///
/// Serialized with the stats site's own league identifiers so the same string
/// keys caches, filters and URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeagueCode {
    #[serde(rename = "EPL")]
    Epl,
    #[serde(rename = "Bundesliga")]
    Bundesliga,
    #[serde(rename = "La_Liga")]
    LaLiga,
    #[serde(rename = "Serie_A")]
    SerieA,
    #[serde(rename = "Ligue_1")]
    Ligue1,
    #[serde(rename = "UCL")]
    Ucl,
}

impl LeagueCode {
    /// Leagues with a published xG table, in fetch order.
    pub const XG_LEAGUES: [LeagueCode; 5] = [
        LeagueCode::Bundesliga,
        LeagueCode::Epl,
        LeagueCode::LaLiga,
        LeagueCode::SerieA,
        LeagueCode::Ligue1,
    ];

    pub const ALL: [LeagueCode; 6] = [
        LeagueCode::Epl,
        LeagueCode::Bundesliga,
        LeagueCode::LaLiga,
        LeagueCode::SerieA,
        LeagueCode::Ligue1,
        LeagueCode::Ucl,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LeagueCode::Epl => "EPL",
            LeagueCode::Bundesliga => "Bundesliga",
            LeagueCode::LaLiga => "La_Liga",
            LeagueCode::SerieA => "Serie_A",
            LeagueCode::Ligue1 => "Ligue_1",
            LeagueCode::Ucl => "UCL",
        }
    }

    /// UCL has no seasonal xG table.
    pub fn has_xg(self) -> bool {
        !matches!(self, LeagueCode::Ucl)
    }
}

impl fmt::Display for LeagueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeagueCode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LeagueCode::ALL
            .into_iter()
            .find(|code| code.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow::anyhow!("unknown league code: {}", s))
    }
}

// ── Fixtures & odds ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    pub logo: Option<String>,
}

/// An upcoming (not started) fixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    /// Upstream fixture ID, also the join key into the odds list
    pub id: u64,
    /// Kickoff as delivered upstream (ISO date or date-time)
    pub date: String,
    /// Free-text league name, e.g. "Premier League" or "England - Premier League"
    pub league_name: String,
    pub league_country: Option<String>,
    pub league_id: Option<u32>,
    pub home: Team,
    pub away: Team,
}

/// One `{label, odd}` pair inside a bookmaker bet. The odd is kept as the raw
/// upstream text; the value engine decides how to read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddQuote {
    pub value: String,
    pub odd: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bet {
    pub name: String,
    pub values: Vec<OddQuote>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmaker {
    pub name: Option<String>,
    pub bets: Vec<Bet>,
}

/// Odds for a single fixture as offered by one or more bookmakers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsEntry {
    pub fixture_id: u64,
    pub bookmakers: Vec<Bookmaker>,
}

impl OddsEntry {
    /// The "Match Winner" bet of the first listed bookmaker.
    pub fn match_winner(&self) -> Option<&Bet> {
        self.bookmakers
            .first()?
            .bets
            .iter()
            .find(|b| b.name == MATCH_WINNER)
    }
}

// ── xG ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamXg {
    pub title: String,
    /// `None` when the row carries no xG figure at all
    pub xg: Option<f64>,
}

/// Seasonal xG per team for one league.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeagueXgTable {
    pub teams: Vec<TeamXg>,
}

impl LeagueXgTable {
    /// Build a table from the stats site's `teamsData` payload.
    ///
    /// Accepts the table at the top level or nested under `teams`, as an
    /// object keyed by team ID or as an array. Object rows keep the order a
    /// browser would enumerate them in: integer IDs ascending, then any other
    /// keys. A row's xG is its own `xG` field when present, otherwise the sum
    /// over its per-match `history`. Rows without a title are skipped; rows
    /// without any figure are kept with no xG.
    pub fn from_json(raw: &Value) -> Option<Self> {
        let table = raw.get("teams").unwrap_or(raw);
        let rows: Vec<&Value> = match table {
            Value::Object(map) => enumeration_order(map),
            Value::Array(items) => items.iter().collect(),
            _ => return None,
        };

        let teams = rows
            .into_iter()
            .filter_map(|row| {
                let title = row["title"]
                    .as_str()
                    .or_else(|| row["name"].as_str())?
                    .to_string();
                let xg = number_field(&row["xG"]).or_else(|| {
                    let history = row["history"].as_array()?;
                    Some(history.iter().filter_map(|m| number_field(&m["xG"])).sum())
                });
                Some(TeamXg { title, xg })
            })
            .collect();

        Some(LeagueXgTable { teams })
    }

    /// Approximate lookup: the first row whose title contains `name`,
    /// compared case-insensitively. An empty name never matches. The first
    /// matching row is the answer even when it has no xG.
    pub fn find_team(&self, name: &str) -> Option<&TeamXg> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.teams
            .iter()
            .find(|t| t.title.to_lowercase().contains(&needle))
    }
}

/// Integer-like keys ascending, then the rest.
fn enumeration_order(map: &Map<String, Value>) -> Vec<&Value> {
    let (mut indexed, named): (Vec<_>, Vec<_>) =
        map.iter().partition(|(k, _)| array_index(k).is_some());
    indexed.sort_by_key(|(k, _)| array_index(k));
    indexed.into_iter().chain(named).map(|(_, v)| v).collect()
}

/// Canonical array-index form: digits only, no leading zeros.
fn array_index(key: &str) -> Option<u32> {
    let n: u32 = key.parse().ok()?;
    (n.to_string() == key && n != u32::MAX).then_some(n)
}

/// Latest xG tables keyed by league. Leagues whose fetch failed are absent.
#[derive(Debug, Clone, Default)]
pub struct XgSnapshot {
    tables: HashMap<LeagueCode, LeagueXgTable>,
}

impl XgSnapshot {
    pub fn insert(&mut self, league: LeagueCode, table: Option<LeagueXgTable>) {
        match table {
            Some(t) => {
                self.tables.insert(league, t);
            }
            None => {
                self.tables.remove(&league);
            }
        }
    }

    pub fn table(&self, league: LeagueCode) -> Option<&LeagueXgTable> {
        if !league.has_xg() {
            return None;
        }
        self.tables.get(&league)
    }

    /// Number of leagues with a usable table.
    pub fn len(&self) -> usize {
        self.tables.len()
    }
}

// ── Derived ──────────────────────────────────────────────────────────────────

/// Value breakdown for a single outcome of the match-winner market.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeValue {
    pub label: String,
    pub odd: f64,
    /// Normalised (vig-removed) implied probability
    pub probability: f64,
    /// Expected profit per unit staked: `probability * odd - 1`
    pub value: f64,
}

/// A fixture joined with its league, odds and xG. Built fresh on every
/// refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedMatch {
    pub fixture: Fixture,
    pub league: LeagueCode,
    pub home_xg: Option<f64>,
    pub away_xg: Option<f64>,
    pub outcomes: Vec<OutcomeValue>,
    /// Best outcome value; `f64::NEG_INFINITY` when the match has no odds
    pub max_value: f64,
}

/// Reads a number that upstreams deliver either as JSON number or as text.
pub fn number_field(v: &Value) -> Option<f64> {
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}
