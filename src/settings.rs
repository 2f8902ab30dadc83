//! Persisted user settings.
//!
//! Settings live in a small JSON blob. Loading layers `SITEWATCH_*`
//! environment variables on top of the file, so
//! `SITEWATCH_POLL_INTERVAL_MS=2000` overrides whatever was saved.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use sitewatch_engine::{EngineConfig, OccupancySync, ScanSync};

/// Which kind of facility is monitored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Parking occupancy sensors.
    #[default]
    Occupancy,
    /// Checkpoint security scans.
    Scan,
}

impl Mode {
    /// Lowercase name, as used in the settings file and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Occupancy => "occupancy",
            Mode::Scan => "scan",
        }
    }
}

/// The settings blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// What to monitor.
    pub mode: Mode,
    /// Backend endpoint; the mock source is used when unset.
    pub endpoint: Option<String>,
    /// Poll interval override; the mode's default applies when unset.
    pub poll_interval_ms: Option<u64>,
    /// Master switch for notifications.
    pub notifications_enabled: bool,
    /// Ask the dispatcher to vibrate for notable records.
    pub vibration_enabled: bool,
    /// Free share below which a category counts as limited.
    pub limited_threshold: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            endpoint: None,
            poll_interval_ms: None,
            notifications_enabled: true,
            vibration_enabled: true,
            limited_threshold: 0.2,
        }
    }
}

impl Settings {
    /// Load from `path` (missing file is fine) plus the process environment.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Load with an explicit environment instead of the process one.
    fn load_with_env(path: &Path, env: Option<HashMap<String, String>>) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path).format(FileFormat::Json).required(false))
            .add_source(
                Environment::with_prefix("SITEWATCH")
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        let settings: Settings = config
            .try_deserialize()
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        Ok(settings.sanitized())
    }

    /// Write the blob as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;
        Ok(())
    }

    fn sanitized(mut self) -> Self {
        if !(0.0..=1.0).contains(&self.limited_threshold) {
            tracing::warn!(
                threshold = self.limited_threshold,
                "Limited threshold out of range, using default"
            );
            self.limited_threshold = Settings::default().limited_threshold;
        }
        self.endpoint = self.endpoint.take().filter(|e| !e.trim().is_empty());
        self
    }

    /// Engine configuration for the selected mode with these settings applied.
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = match self.mode {
            Mode::Occupancy => OccupancySync::default_config(),
            Mode::Scan => ScanSync::default_config(),
        };
        if let Some(ms) = self.poll_interval_ms {
            config = config.with_poll_interval(Duration::from_millis(ms));
        }
        config.transform.limited_threshold = self.limited_threshold;
        // Per-kind toggles stay as the mode set them.
        config.notifications.enabled = self.notifications_enabled;
        config.notifications.vibrate = self.vibration_enabled;
        config
    }
}
