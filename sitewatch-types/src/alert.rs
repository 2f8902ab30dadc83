//! Acknowledgeable alerts wrapping notable change events.

use crate::ChangeEvent;

/// A notable event that an operator can acknowledge.
///
/// Alerts are only ever mutated by [`Alert::acknowledge`]. They are never
/// removed automatically except by the bounded alert log evicting the oldest.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Alert {
    /// Engine-assigned id, unique for the lifetime of an engine.
    pub id: u64,
    /// The event that raised this alert.
    pub event: ChangeEvent,
    /// When the alert was raised, in Unix milliseconds.
    pub raised_at_ms: u64,
    /// Whether someone has acknowledged the alert.
    pub acknowledged: bool,
    /// Who acknowledged it.
    pub acknowledged_by: Option<String>,
    /// When it was acknowledged, in Unix milliseconds.
    pub acknowledged_at_ms: Option<u64>,
    /// Optional operator notes.
    pub notes: Option<String>,
}

impl Alert {
    /// Create a new, unacknowledged alert.
    pub fn new(id: u64, event: ChangeEvent, raised_at_ms: u64) -> Self {
        Self {
            id,
            event,
            raised_at_ms,
            acknowledged: false,
            acknowledged_by: None,
            acknowledged_at_ms: None,
            notes: None,
        }
    }

    /// Mark the alert acknowledged.
    ///
    /// Acknowledging twice overwrites the actor, time and notes.
    pub fn acknowledge(&mut self, actor: impl Into<String>, notes: Option<String>, at_ms: u64) {
        self.acknowledged = true;
        self.acknowledged_by = Some(actor.into());
        self.acknowledged_at_ms = Some(at_ms);
        self.notes = notes;
    }
}
