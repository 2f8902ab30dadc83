//! Connection health as seen by subscribers.

use std::fmt;

/// Connection health of a sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConnectionState {
    /// Not polling (initial state, and after stop).
    #[default]
    Disconnected,
    /// The last cycle succeeded.
    Connected,
    /// Consecutive failures reached the configured threshold.
    Error,
}

impl ConnectionState {
    /// Returns a short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
