//! Notification dispatchers.

use sitewatch_engine::{DispatchError, NotificationDispatcher, NotificationPayload};
use sitewatch_types::EventKind;
use tokio::sync::mpsc;

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

impl NotificationDispatcher for LogDispatcher {
    fn dispatch(&self, kind: EventKind, payload: &NotificationPayload) -> Result<(), DispatchError> {
        tracing::info!(
            kind = kind.as_str(),
            vibrate = payload.vibrate,
            category = payload.category.as_deref().unwrap_or("-"),
            "{}: {}",
            payload.title,
            payload.body
        );
        Ok(())
    }
}

/// A notification handed to a [`ChannelDispatcher`] receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// What happened.
    pub kind: EventKind,
    /// Display payload.
    pub payload: NotificationPayload,
}

/// Forwards notifications into a bounded tokio channel.
///
/// Delivery is best effort: when the receiver lags behind and the buffer
/// is full, the notification is dropped and an error returned.
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::Sender<Notification>,
}

impl ChannelDispatcher {
    /// Create a dispatcher and the receiving end of its channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl NotificationDispatcher for ChannelDispatcher {
    fn dispatch(&self, kind: EventKind, payload: &NotificationPayload) -> Result<(), DispatchError> {
        let notification = Notification {
            kind,
            payload: payload.clone(),
        };
        self.tx.try_send(notification).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                DispatchError::Failed("notification queue full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                DispatchError::Unavailable("notification receiver dropped".to_string())
            }
        })
    }
}
