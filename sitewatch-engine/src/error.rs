//! Error types for the engine and its boundaries.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by a [`RecordSource`](crate::RecordSource).
///
/// All of these are treated as transient by the engine: they are logged,
/// counted, and answered with a stale snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The fetch did not finish in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Could not reach the backend.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The backend answered with a non-success status.
    #[error("backend returned status {0}")]
    Status(u16),

    /// The payload could not be turned into records.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// Anything else.
    #[error("fetch failed: {0}")]
    Other(String),
}

/// Errors returned by a [`NotificationDispatcher`](crate::NotificationDispatcher).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Notifications are not available on this host.
    #[error("notifications unavailable: {0}")]
    Unavailable(String),

    /// Delivering this notification failed.
    #[error("notification failed: {0}")]
    Failed(String),
}

/// Errors surfaced by engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// No alert with this id is retained.
    #[error("alert {0} not found")]
    AlertNotFound(u64),

    /// The scheduler needs a tokio runtime to spawn on.
    #[error("no tokio runtime available to start the scheduler")]
    NoRuntime,
}

/// Why a single cycle attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum CycleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("transform failed: {0}")]
    Transform(String),
}
