//! Engine configuration.

use std::collections::BTreeSet;
use std::time::Duration;

use sitewatch_types::{EventKind, RawRecord, ScanOutcome};

/// Shortest accepted poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Longest accepted poll interval.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Clamp a requested poll interval into the accepted range.
pub fn clamp_interval(interval: Duration) -> Duration {
    interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL)
}

/// Backoff for reactive retries within one cycle.
///
/// The delay before retry `n` (0-based) is `min(base_delay * 2^n, max_delay)`.
/// After `max_attempts` retries the cycle gives up and the scheduler waits
/// for the next tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries per cycle after the initial attempt.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// A policy that never retries within a cycle.
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// Delay before the given 0-based retry attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Parameters for turning raw records into a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformConfig {
    /// Sensor ids per estimated level when no location tag is present.
    pub bucket_size: u32,
    /// Lowest valid level number.
    pub min_category: u32,
    /// Highest valid level number.
    pub max_category: u32,
    /// Free share below which a category is `Limited`.
    pub limited_threshold: f64,
}

impl TransformConfig {
    /// Clamp a level number into `[min_category, max_category]`.
    pub fn clamp_category(&self, n: u64) -> u32 {
        let max = self.max_category.max(self.min_category);
        n.clamp(self.min_category as u64, max as u64) as u32
    }
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            bucket_size: 50,
            min_category: 1,
            max_category: 10,
            limited_threshold: 0.2,
        }
    }
}

/// Which records count as notable (anomalous) and raise alerts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NotablePolicy {
    outcomes: BTreeSet<ScanOutcome>,
}

impl NotablePolicy {
    /// No record is ever notable.
    pub fn none() -> Self {
        Self::default()
    }

    /// Suspicious and threat scans are notable.
    pub fn anomalous_scans() -> Self {
        Self::from_outcomes([ScanOutcome::Suspicious, ScanOutcome::Threat])
    }

    /// Only the given scan outcomes are notable.
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = ScanOutcome>) -> Self {
        Self {
            outcomes: outcomes.into_iter().collect(),
        }
    }

    /// Whether a record matches the policy.
    pub fn is_notable(&self, record: &RawRecord) -> bool {
        record
            .scan_outcome()
            .is_some_and(|outcome| self.outcomes.contains(&outcome))
    }

    /// Whether the policy can ever match.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Which events reach the notification dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPolicy {
    /// Master switch.
    pub enabled: bool,
    /// Aggregate availability increases.
    pub availability: bool,
    /// Category improvements.
    pub category: bool,
    /// Notable records.
    pub notable: bool,
    /// Connection established/lost.
    pub connection: bool,
    /// Ask the dispatcher to vibrate for notable records.
    pub vibrate: bool,
}

impl NotificationPolicy {
    /// Nothing is dispatched.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Whether events of this kind should be dispatched.
    pub fn allows(&self, kind: EventKind) -> bool {
        if !self.enabled {
            return false;
        }
        match kind {
            EventKind::AvailabilityIncreased => self.availability,
            EventKind::CategoryImproved => self.category,
            EventKind::NotableRecord => self.notable,
            EventKind::ConnectionEstablished | EventKind::ConnectionLost => self.connection,
        }
    }
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            availability: true,
            category: true,
            notable: true,
            connection: true,
            vibrate: true,
        }
    }
}

/// Configuration for a [`SyncEngine`](crate::SyncEngine).
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Time between scheduled cycles. Clamped to 1s..=60s.
    pub poll_interval: Duration,
    /// Upper bound on a single fetch.
    pub fetch_timeout: Duration,
    /// Consecutive failures after which the connection is in `Error`.
    pub max_consecutive_failures: u32,
    /// Reactive retry backoff.
    pub retry: RetryPolicy,
    /// Alerts kept before the oldest is evicted.
    pub max_retained_alerts: usize,
    /// Record ids remembered for de-duplication.
    pub max_retained_identifiers: usize,
    /// Snapshot grouping parameters.
    pub transform: TransformConfig,
    /// Which records raise alerts.
    pub notable: NotablePolicy,
    /// Which events are dispatched as notifications.
    pub notifications: NotificationPolicy,
    /// Start polling when the first snapshot subscriber arrives.
    pub auto_start: bool,
}

impl EngineConfig {
    /// Set the poll interval (clamped).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = clamp_interval(interval);
        self
    }

    /// Set the fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Set the failure threshold.
    pub fn with_max_consecutive_failures(mut self, failures: u32) -> Self {
        self.max_consecutive_failures = failures;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the alert log capacity.
    pub fn with_max_retained_alerts(mut self, alerts: usize) -> Self {
        self.max_retained_alerts = alerts;
        self
    }

    /// Set the idempotency tracker capacity.
    pub fn with_max_retained_identifiers(mut self, identifiers: usize) -> Self {
        self.max_retained_identifiers = identifiers;
        self
    }

    /// Set the transform parameters.
    pub fn with_transform(mut self, transform: TransformConfig) -> Self {
        self.transform = transform;
        self
    }

    /// Set the notable-record policy.
    pub fn with_notable(mut self, notable: NotablePolicy) -> Self {
        self.notable = notable;
        self
    }

    /// Set the notification policy.
    pub fn with_notifications(mut self, notifications: NotificationPolicy) -> Self {
        self.notifications = notifications;
        self
    }

    /// Enable or disable auto-start on first subscription.
    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    /// Bring every field into its valid range.
    pub(crate) fn normalized(mut self) -> Self {
        self.poll_interval = clamp_interval(self.poll_interval);
        self.max_consecutive_failures = self.max_consecutive_failures.max(1);
        self.max_retained_alerts = self.max_retained_alerts.max(1);
        self.max_retained_identifiers = self.max_retained_identifiers.max(1);
        self.transform.bucket_size = self.transform.bucket_size.max(1);
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            fetch_timeout: Duration::from_secs(10),
            max_consecutive_failures: 5,
            retry: RetryPolicy::default(),
            max_retained_alerts: 100,
            max_retained_identifiers: 1000,
            transform: TransformConfig::default(),
            notable: NotablePolicy::none(),
            notifications: NotificationPolicy::default(),
            auto_start: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_is_clamped() {
        assert_eq!(clamp_interval(Duration::from_millis(10)), MIN_POLL_INTERVAL);
        assert_eq!(clamp_interval(Duration::from_secs(600)), MAX_POLL_INTERVAL);
        assert_eq!(clamp_interval(Duration::from_secs(5)), Duration::from_secs(5));

        let config = EngineConfig::default().with_poll_interval(Duration::from_millis(1));
        assert_eq!(config.poll_interval, MIN_POLL_INTERVAL);
    }

    #[test]
    fn retry_delay_doubles_and_caps() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.delay_for(0), Duration::from_secs(1));
        assert_eq!(retry.delay_for(1), Duration::from_secs(2));
        assert_eq!(retry.delay_for(4), Duration::from_secs(16));
        assert_eq!(retry.delay_for(5), Duration::from_secs(30));
        assert_eq!(retry.delay_for(40), Duration::from_secs(30));
    }

    #[test]
    fn clamp_category_into_range() {
        let transform = TransformConfig::default();
        assert_eq!(transform.clamp_category(0), 1);
        assert_eq!(transform.clamp_category(4), 4);
        assert_eq!(transform.clamp_category(99), 10);
    }

    #[test]
    fn notable_policy_matches_scan_outcomes() {
        let policy = NotablePolicy::anomalous_scans();
        assert!(policy.is_notable(&RawRecord::scan("a", ScanOutcome::Threat)));
        assert!(policy.is_notable(&RawRecord::scan("b", ScanOutcome::Suspicious)));
        assert!(!policy.is_notable(&RawRecord::scan("c", ScanOutcome::Clear)));
        assert!(!policy.is_notable(&RawRecord::occupancy("d", true)));
        assert!(NotablePolicy::none().is_empty());

        let threats_only = NotablePolicy::from_outcomes([ScanOutcome::Threat]);
        assert!(!threats_only.is_notable(&RawRecord::scan("b", ScanOutcome::Suspicious)));
    }

    #[test]
    fn notification_policy_toggles() {
        let policy = NotificationPolicy {
            availability: false,
            ..NotificationPolicy::default()
        };
        assert!(!policy.allows(EventKind::AvailabilityIncreased));
        assert!(policy.allows(EventKind::CategoryImproved));
        assert!(!NotificationPolicy::disabled().allows(EventKind::NotableRecord));
    }

    #[test]
    fn normalized_fixes_zero_values() {
        let config = EngineConfig {
            max_consecutive_failures: 0,
            max_retained_alerts: 0,
            max_retained_identifiers: 0,
            ..EngineConfig::default()
        }
        .normalized();
        assert_eq!(config.max_consecutive_failures, 1);
        assert_eq!(config.max_retained_alerts, 1);
        assert_eq!(config.max_retained_identifiers, 1);
    }
}
