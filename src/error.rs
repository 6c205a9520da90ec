use thiserror::Error;

/// Failure of the load-bearing fixtures/odds path.
///
/// These propagate to the refresh pipeline: without fixtures there is
/// nothing to rank.
#[derive(Error, Debug)]
pub enum ProxyRequestError {
    /// Upstream answered with a non-success status (including `429` once
    /// the retry budget is spent).
    #[error("proxy HTTP {status}")]
    Status { status: u16 },

    #[error("proxy request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid proxy payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl ProxyRequestError {
    /// HTTP status carried by the error, if the upstream answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProxyRequestError::Status { status } => Some(*status),
            ProxyRequestError::Transport(e) => e.status().map(|s| s.as_u16()),
            ProxyRequestError::Payload(_) => None,
        }
    }
}

/// Why a stats page could not be turned into an xG table.
///
/// Never leaves the `sources` module: the xG path is best-effort and callers
/// only ever see `None`.
#[derive(Error, Debug)]
pub enum XgFetchError {
    #[error("stats request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("stats page returned HTTP {0}")]
    Status(u16),

    #[error("no teamsData assignment found in page")]
    PatternMissing,

    #[error("could not decode embedded payload: {0}")]
    Decode(String),

    #[error("embedded payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("embedded payload has no recognisable team table")]
    Shape,
}
