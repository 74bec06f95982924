// ================================================================
// File: housebot-common/src/error.rs
// ================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Platform error: {0}")]
    Platform(String),

    /// The app access token could not be obtained, validated or refreshed.
    #[error("Credential error: {0}")]
    Credential(String),

    /// Twitch returned no user for the requested login.
    #[error("Twitch channel does not exist: {0}")]
    ChannelNotFound(String),

    /// Helix answered 401 for a token we believed valid.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Upstream query failed: {0}")]
    Upstream(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Parse(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Parse(s.to_string())
    }
}
