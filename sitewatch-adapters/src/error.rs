//! Error types for adapters.

use sitewatch_engine::FetchError;
use thiserror::Error;

/// Errors that can occur when fetching records from a backend.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The backend answered with a non-success status.
    #[error("backend returned status {0}")]
    Status(u16),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout
        } else if err.is_connect() {
            AdapterError::Connection(err.to_string())
        } else if err.is_decode() {
            AdapterError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            AdapterError::Status(status.as_u16())
        } else {
            AdapterError::Http(err.to_string())
        }
    }
}

impl From<AdapterError> for FetchError {
    fn from(err: AdapterError) -> Self {
        match err {
            // The engine reports its own timeout duration; the client's is
            // not known here.
            AdapterError::Timeout => FetchError::Other("request timed out".to_string()),
            AdapterError::Status(status) => FetchError::Status(status),
            AdapterError::Parse(msg) => FetchError::Malformed(msg),
            AdapterError::Connection(msg) => FetchError::Connection(msg),
            AdapterError::Auth(msg) => FetchError::Other(format!("authentication failed: {}", msg)),
            AdapterError::Http(msg) => FetchError::Other(msg),
        }
    }
}
