//! Seasonal team xG scraped from the stats site's league pages.
//!
//! The page embeds the team table as
//! `var teamsData = JSON.parse('<escaped payload>')`. The payload is
//! URL-decoded, then unescaped as a JavaScript string literal, then parsed
//! as JSON. Everything here is best-effort: a failure is logged and becomes
//! `None`.

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::Url;

use super::provider::XgSource;
use super::RemoteDataClient;
use crate::error::XgFetchError;
use crate::models::{LeagueCode, LeagueXgTable};

static RE_TEAMS_DATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"var teamsData\s*=\s*JSON\.parse\('(.*?)'\)").unwrap()
});

/// Cache key for one league/season page.
pub fn xg_cache_key(league: LeagueCode, season: &str) -> String {
    format!("understat_{}_{}", league.as_str(), season)
}

impl RemoteDataClient {
    /// xG table for `league`/`season`, from cache or the stats site.
    pub async fn fetch_league_xg(&self, league: LeagueCode, season: &str) -> Option<LeagueXgTable> {
        let key = xg_cache_key(league, season);
        if let Some(raw) = self.cache.get::<Value>(&key) {
            if let Some(table) = LeagueXgTable::from_json(&raw) {
                return Some(table);
            }
        }

        match self.load_league_xg(league, season).await {
            Ok((raw, table)) => {
                self.cache.set(&key, &raw);
                Some(table)
            }
            Err(e) => {
                warn!("xG unavailable for {} {}: {}", league, season, e);
                None
            }
        }
    }

    async fn load_league_xg(
        &self,
        league: LeagueCode,
        season: &str,
    ) -> Result<(Value, LeagueXgTable), XgFetchError> {
        let url = league_page_url(&self.stats_base, league, season);
        debug!("Fetching xG page {}", url);

        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(XgFetchError::Status(resp.status().as_u16()));
        }
        let page = resp.text().await?;

        let raw = extract_teams_data(&page)?;
        let table = LeagueXgTable::from_json(&raw).ok_or(XgFetchError::Shape)?;
        Ok((raw, table))
    }
}

#[async_trait]
impl XgSource for RemoteDataClient {
    async fn fetch_league_xg(&self, league: LeagueCode, season: &str) -> Option<LeagueXgTable> {
        RemoteDataClient::fetch_league_xg(self, league, season).await
    }
}

/// `<base>/league/<league>/<season>` with each segment percent-encoded.
fn league_page_url(base: &Url, league: LeagueCode, season: &str) -> Url {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .pop_if_empty()
            .extend(["league", league.as_str(), season]);
    }
    url
}

/// Pull the `teamsData` payload out of a league page and decode it.
pub fn extract_teams_data(page: &str) -> Result<Value, XgFetchError> {
    let escaped = RE_TEAMS_DATA
        .captures(page)
        .and_then(|c| c.get(1))
        .ok_or(XgFetchError::PatternMissing)?
        .as_str();

    let url_decoded =
        urlencoding::decode(escaped).map_err(|e| XgFetchError::Decode(e.to_string()))?;
    let json_text = unescape_js_literal(&url_decoded)?;
    Ok(serde_json::from_str(&json_text)?)
}

/// Undo JavaScript string-literal escaping (`\xHH`, `\uXXXX`, `\n`, `\'` …).
fn unescape_js_literal(raw: &str) -> Result<String, XgFetchError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('x') => {
                let code = read_hex(&mut chars, 2)?;
                out.push(char_from(code)?);
            }
            Some('u') => {
                let unit = read_hex(&mut chars, 4)?;
                if (0xD800..0xDC00).contains(&unit) {
                    // High surrogate: the low half must follow as another \u escape
                    if chars.next() != Some('\\') || chars.next() != Some('u') {
                        return Err(XgFetchError::Decode("unpaired surrogate".into()));
                    }
                    let low = read_hex(&mut chars, 4)?;
                    if !(0xDC00..0xE000).contains(&low) {
                        return Err(XgFetchError::Decode("unpaired surrogate".into()));
                    }
                    let combined = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                    out.push(char_from(combined)?);
                } else {
                    out.push(char_from(unit)?);
                }
            }
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => return Err(XgFetchError::Decode("dangling escape".into())),
        }
    }
    Ok(out)
}

fn read_hex(chars: &mut std::str::Chars<'_>, len: usize) -> Result<u32, XgFetchError> {
    let digits: String = chars.by_ref().take(len).collect();
    if digits.len() != len {
        return Err(XgFetchError::Decode("truncated escape".into()));
    }
    u32::from_str_radix(&digits, 16).map_err(|_| XgFetchError::Decode(format!("bad hex escape {}", digits)))
}

fn char_from(code: u32) -> Result<char, XgFetchError> {
    char::from_u32(code).ok_or_else(|| XgFetchError::Decode(format!("invalid code point {:#x}", code)))
}
