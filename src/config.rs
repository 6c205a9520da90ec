use chrono::NaiveDate;
use clap::Parser;

use crate::presenter::LeagueFilter;

/// Football value-bet dashboard: bookmaker odds against season xG
#[derive(Parser, Debug, Clone)]
#[command(name = "xg-value-scout", version, about)]
pub struct Config {
    /// Dashboard listen address
    #[arg(long, env = "DASHBOARD_ADDR", default_value = "127.0.0.1:3000")]
    pub dashboard_addr: String,

    /// SQLite file backing the response cache
    #[arg(long, env = "CACHE_PATH", default_value = "xg_value_cache.db")]
    pub cache_path: String,

    /// Lifetime of a cached response in seconds
    #[arg(long, env = "CACHE_TTL_SECS", default_value = "300")]
    pub cache_ttl_secs: u64,

    /// Base URL of the fixtures/odds intermediary (usually this server's /proxy)
    #[arg(long, env = "PROXY_URL", default_value = "http://127.0.0.1:3000/proxy")]
    pub proxy_url: String,

    /// API-Football base URL the /proxy route forwards to
    #[arg(
        long,
        env = "API_SPORTS_URL",
        default_value = "https://v3.football.api-sports.io"
    )]
    pub api_sports_url: String,

    /// API-Football key; the /proxy route is only mounted when set
    #[arg(long, env = "API_SPORTS_KEY")]
    pub api_sports_key: Option<String>,

    /// Base URL of the xG statistics site
    #[arg(long, env = "STATS_URL", default_value = "https://understat.com")]
    pub stats_url: String,

    /// Season used for the xG tables (start year)
    #[arg(long, env = "SEASON", default_value = "2024")]
    pub season: String,

    /// Retries after an HTTP 429 from the intermediary
    #[arg(long, env = "MAX_RETRIES", default_value = "2")]
    pub max_retries: u32,

    /// Delay before each 429 retry in milliseconds
    #[arg(long, env = "RETRY_DELAY_MS", default_value = "1500")]
    pub retry_delay_ms: u64,

    /// Upper bound on odds pages followed per refresh
    #[arg(long, env = "ODDS_MAX_PAGES", default_value = "3")]
    pub odds_max_pages: u32,

    /// Per-request HTTP timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "10")]
    pub request_timeout_secs: u64,

    /// Fall back to the built-in sample dataset when live data fails
    #[arg(long, env = "SAMPLE_MODE", default_value = "false")]
    pub sample: bool,

    /// Run one refresh, print it and exit instead of serving the dashboard
    #[arg(long)]
    pub once: bool,

    /// Match date (YYYY-MM-DD), today if omitted
    #[arg(long, env = "MATCH_DATE")]
    pub date: Option<NaiveDate>,

    /// Minimum best-outcome value to show (0.05 = 5%)
    #[arg(long, env = "MIN_VALUE", default_value = "0.0", allow_negative_numbers = true)]
    pub min_value: f64,

    /// League filter: all, EPL, Bundesliga, La_Liga, Serie_A, Ligue_1 or UCL
    #[arg(long, env = "LEAGUE", default_value = "all")]
    pub league: String,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cache_ttl_secs == 0 {
            anyhow::bail!("cache_ttl_secs must be positive");
        }
        if self.max_retries > 10 {
            anyhow::bail!("max_retries must be at most 10");
        }
        if self.odds_max_pages == 0 {
            anyhow::bail!("odds_max_pages must be at least 1");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be positive");
        }
        if !self.min_value.is_finite() {
            anyhow::bail!("min_value must be a finite number");
        }
        if self.season.trim().is_empty() {
            anyhow::bail!("season must not be empty");
        }
        self.league_filter()?;
        Ok(())
    }

    pub fn league_filter(&self) -> anyhow::Result<LeagueFilter> {
        self.league.parse()
    }
}
