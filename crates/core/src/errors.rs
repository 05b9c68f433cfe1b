//! Core error types for Chainwatch.
//!
//! Every remote or storage failure in the workspace is normalized into this
//! small taxonomy so callers can log it and abandon the current cycle.

use thiserror::Error;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type shared by all Chainwatch crates.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// No credential has been entered yet.
    #[error("No API credential configured")]
    NoCredential,

    /// The call was made too soon after the previous one.
    /// Callers skip the cycle instead of retrying.
    #[error("Rate limited: minimum request spacing not elapsed")]
    RateLimited,

    /// Connection-level failure (DNS, TLS, timeout, reset).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote answered with a non-200 status.
    #[error("HTTP error: status {0}")]
    HttpError(u16),

    /// The decoded body carried an embedded application error.
    #[error("API error {0}: {1}")]
    ApiError(i64, String),

    /// The body could not be decoded.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Persisted data was malformed. Recovered by resetting to the default.
    #[error("Stored data is corrupt: {0}")]
    StorageCorrupt(String),

    /// The local slot file could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Returns true for failures that are expected to clear up on their own.
    ///
    /// Nothing retries on this basis; it only decides how loudly to log.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited | Self::Transport(_) => true,
            Self::HttpError(status) => *status >= 500,
            _ => false,
        }
    }
}

/// Request URLs carry the API key or store token, so they are stripped
/// before the message is kept.
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_decode() {
            Error::ParseError(err.to_string())
        } else if let Some(status) = err.status() {
            Error::HttpError(status.as_u16())
        } else {
            Error::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ParseError(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
