use tracing::debug;

use crate::models::{EnrichedMatch, Fixture, LeagueCode, OddsEntry, XgSnapshot};
use crate::value::compute_outcome_values;

/// Substring → league code, checked in order. The competition name goes
/// first so "UEFA Champions League" is not claimed by a country entry.
const LEAGUE_PATTERNS: &[(&str, LeagueCode)] = &[
    ("Champions League", LeagueCode::Ucl),
    ("England", LeagueCode::Epl),
    ("Germany", LeagueCode::Bundesliga),
    ("Spain", LeagueCode::LaLiga),
    ("Italy", LeagueCode::SerieA),
    ("France", LeagueCode::Ligue1),
];

/// Map free-text league naming to a league code. `None` means the fixture
/// is outside the supported set.
pub fn league_code_for(text: &str) -> Option<LeagueCode> {
    LEAGUE_PATTERNS
        .iter()
        .find(|(pattern, _)| text.contains(pattern))
        .map(|(_, code)| *code)
}

/// Text the league mapping runs on: `"<country> - <name>"` when the
/// upstream supplies a country, otherwise the bare name.
fn league_text(fixture: &Fixture) -> String {
    match fixture.league_country.as_deref().map(str::trim) {
        Some(country) if !country.is_empty() => format!("{} - {}", country, fixture.league_name),
        _ => fixture.league_name.clone(),
    }
}

/// Join one fixture with its odds and its league's xG table.
///
/// Returns `None` only when the league cannot be mapped; every other gap
/// (no odds entry, no match-winner bet, unknown team) degrades in place.
pub fn enrich(fixture: &Fixture, odds: &[OddsEntry], xg: &XgSnapshot) -> Option<EnrichedMatch> {
    let league = match league_code_for(&league_text(fixture)) {
        Some(code) => code,
        None => {
            debug!(
                "Excluding fixture {} ({}): unsupported league",
                fixture.id, fixture.league_name
            );
            return None;
        }
    };

    let bet = odds
        .iter()
        .find(|o| o.fixture_id == fixture.id)
        .and_then(OddsEntry::match_winner);

    let (home_xg, away_xg) = match xg.table(league) {
        Some(table) => (
            table.find_team(&fixture.home.name).and_then(|t| t.xg),
            table.find_team(&fixture.away.name).and_then(|t| t.xg),
        ),
        None => (None, None),
    };

    let breakdown = compute_outcome_values(bet);

    Some(EnrichedMatch {
        fixture: fixture.clone(),
        league,
        home_xg,
        away_xg,
        outcomes: breakdown.outcomes,
        max_value: breakdown.max_value,
    })
}

/// Enrich every fixture, dropping those outside the supported leagues.
/// Input order is preserved.
pub fn enrich_all(fixtures: &[Fixture], odds: &[OddsEntry], xg: &XgSnapshot) -> Vec<EnrichedMatch> {
    fixtures
        .iter()
        .filter_map(|f| enrich(f, odds, xg))
        .collect()
}
