//! Occupancy sync: free-space statistics from periodic sensor polls.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use sitewatch_types::{CategoryKey, CategorySummary};

use crate::config::{EngineConfig, NotablePolicy};
use crate::dispatch::NotificationDispatcher;
use crate::engine::SyncEngine;
use crate::source::RecordSource;

/// A [`SyncEngine`] tuned for parking sensors.
///
/// Polls every 10 seconds by default and never raises alerts; users are
/// notified when spaces free up.
#[derive(Debug, Clone)]
pub struct OccupancySync {
    engine: SyncEngine,
}

impl OccupancySync {
    /// Default poll interval.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

    /// The default configuration for occupancy polling.
    pub fn default_config() -> EngineConfig {
        EngineConfig::default()
            .with_poll_interval(Self::DEFAULT_INTERVAL)
            .with_notable(NotablePolicy::none())
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
            .name("occupancy")
            .dispatcher(dispatcher)
            .config(config)
            .build();
        Self { engine }
    }

    /// The underlying engine.
    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Summary for one level of the current snapshot.
    pub fn level(&self, level: u32) -> Option<CategorySummary> {
        self.engine
            .current_snapshot()?
            .category(&CategoryKey::Numbered(level))
            .cloned()
    }

    /// Free spaces in the current snapshot.
    pub fn free_spaces(&self) -> u32 {
        self.engine.current_snapshot().map_or(0, |s| s.available)
    }
}

impl Deref for OccupancySync {
    type Target = SyncEngine;

    fn deref(&self) -> &SyncEngine {
        &self.engine
    }
}
