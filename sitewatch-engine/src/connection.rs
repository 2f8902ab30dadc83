//! Connection health state machine.

use sitewatch_types::ConnectionState;

/// A change of connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State before the change.
    pub from: ConnectionState,
    /// State after the change.
    pub to: ConnectionState,
}

/// Tracks connection state from cycle outcomes.
///
/// - a success moves to `Connected` and resets the failure count
/// - a failure below the threshold keeps the current state
/// - the failure that reaches the threshold moves to `Error`
/// - `stop` forces `Disconnected`
///
/// Every method returns a [`Transition`] only when the state really changed.
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    consecutive_failures: u32,
    max_consecutive_failures: u32,
}

impl ConnectionMachine {
    /// Create a machine in `Disconnected`.
    pub fn new(max_consecutive_failures: u32) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            consecutive_failures: 0,
            max_consecutive_failures: max_consecutive_failures.max(1),
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Failures since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// A cycle succeeded.
    pub fn on_success(&mut self) -> Option<Transition> {
        self.consecutive_failures = 0;
        self.move_to(ConnectionState::Connected)
    }

    /// A fetch attempt failed.
    pub fn on_failure(&mut self) -> Option<Transition> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures >= self.max_consecutive_failures {
            self.move_to(ConnectionState::Error)
        } else {
            None
        }
    }

    /// Polling stopped.
    pub fn stop(&mut self) -> Option<Transition> {
        self.consecutive_failures = 0;
        self.move_to(ConnectionState::Disconnected)
    }

    fn move_to(&mut self, to: ConnectionState) -> Option<Transition> {
        if self.state == to {
            return None;
        }
        let from = std::mem::replace(&mut self.state, to);
        Some(Transition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        let machine = ConnectionMachine::new(5);
        assert_eq!(machine.state(), ConnectionState::Disconnected);
        assert_eq!(machine.consecutive_failures(), 0);
    }

    #[test]
    fn success_connects_once() {
        let mut machine = ConnectionMachine::new(5);
        assert_eq!(
            machine.on_success(),
            Some(Transition {
                from: ConnectionState::Disconnected,
                to: ConnectionState::Connected,
            })
        );
        assert_eq!(machine.on_success(), None);
    }

    #[test]
    fn error_exactly_once_at_threshold() {
        let mut machine = ConnectionMachine::new(5);
        machine.on_success();

        let transitions: Vec<_> = (0..12).filter_map(|_| machine.on_failure()).collect();
        assert_eq!(
            transitions,
            vec![Transition {
                from: ConnectionState::Connected,
                to: ConnectionState::Error,
            }]
        );
        assert_eq!(machine.consecutive_failures(), 12);
    }

    #[test]
    fn failures_below_threshold_keep_state() {
        let mut machine = ConnectionMachine::new(3);
        machine.on_success();
        assert_eq!(machine.on_failure(), None);
        assert_eq!(machine.on_failure(), None);
        assert_eq!(machine.state(), ConnectionState::Connected);

        // A success resets the count.
        machine.on_success();
        assert_eq!(machine.on_failure(), None);
        assert_eq!(machine.on_failure(), None);
        assert!(machine.on_failure().is_some());
    }

    #[test]
    fn recovery_and_stop() {
        let mut machine = ConnectionMachine::new(1);
        assert!(machine.on_failure().is_some());
        assert_eq!(machine.state(), ConnectionState::Error);

        let recovered = machine.on_success().unwrap();
        assert_eq!(recovered.from, ConnectionState::Error);

        assert!(machine.stop().is_some());
        assert_eq!(machine.stop(), None);
        assert_eq!(machine.state(), ConnectionState::Disconnected);
    }
}
