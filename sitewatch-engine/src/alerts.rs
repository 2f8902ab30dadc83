//! Bounded, acknowledgeable alert log.

use std::collections::VecDeque;

use sitewatch_types::{Alert, ChangeEvent};

use crate::error::EngineError;

/// Alerts raised for notable events, newest first.
///
/// Alerts are never removed except by eviction once more than `capacity`
/// are held, oldest first.
#[derive(Debug, Clone)]
pub struct AlertLog {
    alerts: VecDeque<Alert>,
    capacity: usize,
    next_id: u64,
}

impl AlertLog {
    /// Create a log holding at most `capacity` alerts (at least 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            alerts: VecDeque::new(),
            capacity: capacity.max(1),
            next_id: 1,
        }
    }

    /// Raise a new alert for an event.
    pub fn raise(&mut self, event: ChangeEvent, at_ms: u64) -> Alert {
        let alert = Alert::new(self.next_id, event, at_ms);
        self.next_id += 1;
        self.alerts.push_front(alert.clone());
        self.alerts.truncate(self.capacity);
        alert
    }

    /// Acknowledge an alert by id, returning the updated alert.
    ///
    /// Acknowledging twice overwrites actor, notes and time.
    pub fn acknowledge(
        &mut self,
        id: u64,
        actor: &str,
        notes: Option<String>,
        at_ms: u64,
    ) -> Result<Alert, EngineError> {
        let alert = self
            .alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(EngineError::AlertNotFound(id))?;
        alert.acknowledge(actor, notes, at_ms);
        Ok(alert.clone())
    }

    /// All retained alerts, newest first.
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.iter().cloned().collect()
    }

    /// Alerts not yet acknowledged, newest first.
    pub fn unacknowledged(&self) -> Vec<Alert> {
        self.alerts.iter().filter(|a| !a.acknowledged).cloned().collect()
    }

    /// Number of unacknowledged alerts.
    pub fn open_count(&self) -> usize {
        self.alerts.iter().filter(|a| !a.acknowledged).count()
    }

    /// Number of retained alerts.
    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    /// Whether no alerts are retained.
    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Drop every alert. Ids keep increasing.
    pub fn clear(&mut self) {
        self.alerts.clear();
    }
}
