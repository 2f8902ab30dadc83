//! Scan monitoring sync: security scan events with anomaly alerts.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use sitewatch_types::{Alert, ChangeEvent, ScanOutcome};

use crate::config::{EngineConfig, NotablePolicy, NotificationPolicy};
use crate::dispatch::NotificationDispatcher;
use crate::engine::SyncEngine;
use crate::source::RecordSource;

/// A [`SyncEngine`] tuned for checkpoint scanners.
///
/// Polls every 5 seconds by default. Suspicious and threat scans raise one
/// alert each; the backend returns a sliding window of recent scans, so the
/// same scan is usually seen several times. Only notable scans and
/// connection changes are dispatched as notifications.
#[derive(Debug, Clone)]
pub struct ScanSync {
    engine: SyncEngine,
}

impl ScanSync {
    /// Default poll interval.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

    /// The default configuration for scan monitoring.
    pub fn default_config() -> EngineConfig {
        EngineConfig::default()
            .with_poll_interval(Self::DEFAULT_INTERVAL)
            .with_notable(NotablePolicy::anomalous_scans())
            .with_notifications(NotificationPolicy {
                availability: false,
                category: false,
                ..NotificationPolicy::default()
            })
    }

    /// Create with the default configuration.
    pub fn new(source: Arc<dyn RecordSource>, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self::with_config(source, dispatcher, Self::default_config())
    }

    /// Create with a custom configuration.
    pub fn with_config(
        source: Arc<dyn RecordSource>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        config: EngineConfig,
    ) -> Self {
        let engine = SyncEngine::builder(source)
            .name("scan")
            .dispatcher(dispatcher)
            .config(config)
            .build();
        Self { engine }
    }

    /// The underlying engine.
    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Alerts nobody has acknowledged yet, newest first.
    pub fn open_alerts(&self) -> Vec<Alert> {
        self.engine
            .alerts()
            .into_iter()
            .filter(|a| !a.acknowledged)
            .collect()
    }

    /// Alerts raised for the given scan outcome, newest first.
    pub fn alerts_with_outcome(&self, outcome: ScanOutcome) -> Vec<Alert> {
        self.engine
            .alerts()
            .into_iter()
            .filter(|a| {
                matches!(&a.event, ChangeEvent::NotableRecord { outcome: Some(o), .. } if *o == outcome)
            })
            .collect()
    }
}

impl Deref for ScanSync {
    type Target = SyncEngine;

    fn deref(&self) -> &SyncEngine {
        &self.engine
    }
}
