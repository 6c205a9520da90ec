use serde::{Serialize, Serializer};
use std::fmt::{self, Write as _};
use std::str::FromStr;

use crate::enrich::enrich_all;
use crate::models::{EnrichedMatch, Fixture, LeagueCode, OddsEntry, XgSnapshot};

/// Values at or above this are highlighted as high value.
pub const HIGH_VALUE_THRESHOLD: f64 = 0.10;
/// Values at or above this (and below high) are non-negative / mid.
pub const NON_NEGATIVE_THRESHOLD: f64 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueTier {
    High,
    Mid,
    Low,
}

impl ValueTier {
    pub fn classify(value: f64) -> Self {
        if value >= HIGH_VALUE_THRESHOLD {
            ValueTier::High
        } else if value >= NON_NEGATIVE_THRESHOLD {
            ValueTier::Mid
        } else {
            ValueTier::Low
        }
    }
}

/// League filter from the UI: everything, or a single league.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeagueFilter {
    #[default]
    All,
    Only(LeagueCode),
}

impl LeagueFilter {
    fn admits(self, league: LeagueCode) -> bool {
        match self {
            LeagueFilter::All => true,
            LeagueFilter::Only(code) => code == league,
        }
    }
}

impl FromStr for LeagueFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(LeagueFilter::All);
        }
        Ok(LeagueFilter::Only(s.parse()?))
    }
}

impl fmt::Display for LeagueFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeagueFilter::All => f.write_str("all"),
            LeagueFilter::Only(code) => write!(f, "{}", code),
        }
    }
}

impl Serialize for LeagueFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// League filter, then minimum value, then best value first.
pub fn present(
    matches: Vec<EnrichedMatch>,
    min_value: f64,
    league_filter: LeagueFilter,
) -> Vec<EnrichedMatch> {
    let mut kept: Vec<EnrichedMatch> = matches
        .into_iter()
        .filter(|m| league_filter.admits(m.league))
        .filter(|m| m.max_value >= min_value)
        .collect();
    kept.sort_by(|a, b| b.max_value.total_cmp(&a.max_value));
    kept
}

// ── Cards ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeRow {
    /// e.g. "Home @ 1.9"
    pub label: String,
    /// e.g. "-4.6%"
    pub value_pct: String,
    pub value: f64,
    pub probability: f64,
    pub tier: ValueTier,
}

/// One rendered match card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCard {
    pub fixture_id: u64,
    pub kickoff: String,
    pub league: LeagueCode,
    pub home: String,
    pub away: String,
    pub home_logo: Option<String>,
    pub away_logo: Option<String>,
    /// `None` when the match has no odds
    pub max_value: Option<f64>,
    /// e.g. "EPL · 3.2%"
    pub headline: String,
    pub tier: ValueTier,
    pub outcomes: Vec<OutcomeRow>,
    /// e.g. "xG: 12.40 (H) | N/A (A)"
    pub xg_line: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Presentation {
    /// The upstream had no fixtures for the date at all.
    NoFixtures,
    /// Fixtures exist but none survive league mapping and filters.
    NoMatchesForFilter,
    Cards { cards: Vec<MatchCard> },
}

impl Presentation {
    pub fn cards(&self) -> &[MatchCard] {
        match self {
            Presentation::Cards { cards } => cards,
            _ => &[],
        }
    }

    /// UI message for the empty states.
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            Presentation::NoFixtures => Some("No matches for the selected date."),
            Presentation::NoMatchesForFilter => Some("No matches for the current filter."),
            Presentation::Cards { .. } => None,
        }
    }
}

fn percent(value: f64) -> String {
    if value.is_finite() {
        format!("{:.1}%", value * 100.0)
    } else {
        "n/a".to_string()
    }
}

fn xg_text(xg: Option<f64>) -> String {
    match xg {
        Some(v) => format!("{:.2}", v),
        None => "N/A".to_string(),
    }
}

pub fn to_card(m: &EnrichedMatch) -> MatchCard {
    let outcomes = m
        .outcomes
        .iter()
        .map(|o| OutcomeRow {
            label: format!("{} @ {}", o.label, o.odd),
            value_pct: percent(o.value),
            value: o.value,
            probability: o.probability,
            tier: ValueTier::classify(o.value),
        })
        .collect();

    MatchCard {
        fixture_id: m.fixture.id,
        kickoff: m.fixture.date.clone(),
        league: m.league,
        home: m.fixture.home.name.clone(),
        away: m.fixture.away.name.clone(),
        home_logo: m.fixture.home.logo.clone(),
        away_logo: m.fixture.away.logo.clone(),
        max_value: m.max_value.is_finite().then_some(m.max_value),
        headline: format!("{} · {}", m.league, percent(m.max_value)),
        tier: ValueTier::classify(m.max_value),
        outcomes,
        xg_line: format!("xG: {} (H) | {} (A)", xg_text(m.home_xg), xg_text(m.away_xg)),
    }
}

/// Full render step: enrich, filter, sort and turn into cards.
pub fn render_matches(
    fixtures: &[Fixture],
    odds: &[OddsEntry],
    xg: &XgSnapshot,
    min_value: f64,
    league_filter: LeagueFilter,
) -> Presentation {
    if fixtures.is_empty() {
        return Presentation::NoFixtures;
    }
    let shown = present(enrich_all(fixtures, odds, xg), min_value, league_filter);
    if shown.is_empty() {
        return Presentation::NoMatchesForFilter;
    }
    Presentation::Cards {
        cards: shown.iter().map(to_card).collect(),
    }
}

/// Plain-text rendering for the terminal.
pub fn render_text(presentation: &Presentation) -> String {
    if let Some(notice) = presentation.notice() {
        return format!("{}\n", notice);
    }
    let mut out = String::new();
    for card in presentation.cards() {
        let _ = writeln!(out, "{} vs {}  [{}]  {}", card.home, card.away, card.headline, card.kickoff);
        if card.outcomes.is_empty() {
            let _ = writeln!(out, "    no odds available");
        }
        for row in &card.outcomes {
            let _ = writeln!(out, "    {:<18} {:>8}", row.label, row.value_pct);
        }
        let _ = writeln!(out, "    {}", card.xg_line);
    }
    out
}
