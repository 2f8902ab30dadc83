//! Wiring a settings blob to a running engine.

use std::sync::Arc;

use anyhow::Result;
use sitewatch_adapters::{LogDispatcher, MockOccupancySource, MockScanSource};
use sitewatch_engine::{NotificationDispatcher, OccupancySync, RecordSource, ScanSync, SyncEngine};

use crate::settings::{Mode, Settings};

/// Mock garage shape used when no endpoint is configured.
const MOCK_LEVELS: u32 = 4;
const MOCK_SPACES_PER_LEVEL: u32 = 50;

/// Mock checkpoints used when no endpoint is configured.
const MOCK_CHECKPOINTS: [&str; 3] = ["Gate A", "Gate B", "Cargo"];

/// Build the engine described by `settings`.
///
/// `token` is sent as a bearer token when polling a real endpoint.
pub fn build_engine(settings: &Settings, token: Option<String>) -> Result<SyncEngine> {
    let config = settings.engine_config();
    let source = build_source(settings, token, &config)?;
    let dispatcher: Arc<dyn NotificationDispatcher> = Arc::new(LogDispatcher);

    let engine = match settings.mode {
        Mode::Occupancy => OccupancySync::with_config(source, dispatcher, config)
            .engine()
            .clone(),
        Mode::Scan => ScanSync::with_config(source, dispatcher, config).engine().clone(),
    };
    Ok(engine)
}

fn build_source(
    settings: &Settings,
    token: Option<String>,
    config: &sitewatch_engine::EngineConfig,
) -> Result<Arc<dyn RecordSource>> {
    match &settings.endpoint {
        Some(endpoint) => remote_source(endpoint, token, config),
        None => {
            tracing::info!(mode = settings.mode.as_str(), "No endpoint configured, using mock data");
            Ok(match settings.mode {
                Mode::Occupancy => {
                    Arc::new(MockOccupancySource::new(MOCK_LEVELS, MOCK_SPACES_PER_LEVEL))
                }
                Mode::Scan => Arc::new(MockScanSource::new(MOCK_CHECKPOINTS)),
            })
        }
    }
}

#[cfg(feature = "http")]
fn remote_source(
    endpoint: &str,
    token: Option<String>,
    config: &sitewatch_engine::EngineConfig,
) -> Result<Arc<dyn RecordSource>> {
    use sitewatch_adapters::http::HttpSource;

    let mut builder = HttpSource::builder()
        .endpoint(endpoint)
        .timeout(config.fetch_timeout);
    if let Some(token) = token {
        builder = builder.bearer_token(token);
    }
    Ok(Arc::new(builder.build()?))
}

#[cfg(not(feature = "http"))]
fn remote_source(
    endpoint: &str,
    _token: Option<String>,
    _config: &sitewatch_engine::EngineConfig,
) -> Result<Arc<dyn RecordSource>> {
    anyhow::bail!("cannot poll {endpoint}: built without the `http` feature")
}
