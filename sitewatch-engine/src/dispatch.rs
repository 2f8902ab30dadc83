//! The notification dispatcher boundary.

use sitewatch_types::{ChangeEvent, ConnectionState, EventKind};

use crate::error::DispatchError;

/// Everything a dispatcher needs to show one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload {
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub body: String,
    /// Whether the host should also vibrate.
    pub vibrate: bool,
    /// Related category, rendered for display.
    pub category: Option<String>,
    /// Related record identifier.
    pub record_id: Option<String>,
}

impl NotificationPayload {
    /// Build the payload for a change event.
    pub fn for_event(event: &ChangeEvent, vibrate: bool) -> Self {
        Self {
            title: event.title(),
            body: event.body(),
            vibrate: vibrate && event.kind() == EventKind::NotableRecord,
            category: event.category().map(|c| c.to_string()),
            record_id: event.record_id().map(str::to_string),
        }
    }

    /// Build the payload for a connection transition.
    pub fn for_connection(state: ConnectionState, source: &str, detail: Option<&str>) -> Self {
        let (title, body) = match state {
            ConnectionState::Connected => ("Connected".to_string(), format!("Receiving updates from {}", source)),
            _ => (
                "Connection lost".to_string(),
                match detail {
                    Some(detail) => format!("{} is unreachable: {}", source, detail),
                    None => format!("{} is unreachable", source),
                },
            ),
        };
        Self {
            title,
            body,
            vibrate: false,
            category: None,
            record_id: None,
        }
    }
}

/// Performs user-visible side effects for engine events.
///
/// Calls are fire-and-forget: the engine logs and swallows any error, and
/// never waits on delivery. Implementations must not block.
pub trait NotificationDispatcher: Send + Sync + std::fmt::Debug {
    /// Deliver one notification.
    fn dispatch(&self, kind: EventKind, payload: &NotificationPayload) -> Result<(), DispatchError>;
}

/// A dispatcher that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDispatcher;

impl NotificationDispatcher for NoopDispatcher {
    fn dispatch(&self, _kind: EventKind, _payload: &NotificationPayload) -> Result<(), DispatchError> {
        Ok(())
    }
}
