//! One-shot JSON export of the engine state.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use sitewatch_engine::SyncEngine;

/// Write the current snapshot, stats, alerts and service status to `path`.
///
/// Run a cycle first; without a snapshot the summary is empty and
/// `snapshot` is `null`.
pub fn export_to_file(engine: &SyncEngine, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&Value::Object(export_value(engine)?))?;
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(json.as_bytes())?;

    println!("Exported {} state to: {}", engine.name(), path.display());
    Ok(())
}

fn export_value(engine: &SyncEngine) -> Result<Map<String, Value>> {
    let snapshot = engine.current_snapshot();
    let status = engine.status();
    let mut export = Map::new();

    let mut summary = Map::new();
    if let Some(snapshot) = &snapshot {
        summary.insert("total".to_string(), json!(snapshot.total));
        summary.insert("available".to_string(), json!(snapshot.available));
        summary.insert("occupied".to_string(), json!(snapshot.occupied()));
        summary.insert("occupancy".to_string(), json!(snapshot.occupancy()));
        summary.insert("live".to_string(), json!(snapshot.is_live));
        summary.insert("captured_at_ms".to_string(), json!(snapshot.timestamp_ms));
    }
    summary.insert("connection".to_string(), json!(status.connection.to_string()));
    export.insert("summary".to_string(), Value::Object(summary));

    let categories: Vec<Value> = snapshot
        .iter()
        .flat_map(|s| s.categories.iter())
        .map(|c| {
            json!({
                "name": c.key.to_string(),
                "total": c.total,
                "available": c.available,
                "occupancy": c.occupancy,
                "status": c.status.label(),
            })
        })
        .collect();
    export.insert("categories".to_string(), Value::Array(categories));

    export.insert("snapshot".to_string(), serde_json::to_value(&snapshot)?);
    export.insert("stats".to_string(), serde_json::to_value(engine.stats())?);
    export.insert("alerts".to_string(), serde_json::to_value(engine.alerts())?);

    export.insert(
        "status".to_string(),
        json!({
            "name": status.name,
            "source": status.source,
            "interval_ms": status.interval.as_millis() as u64,
            "consecutive_failures": status.consecutive_failures,
            "cycles": status.cycles,
            "failed_attempts": status.failed_attempts,
            "open_alerts": status.open_alerts,
            "tracked_ids": status.tracked_ids,
            "last_error": status.last_error,
            "last_success_ms": status.last_success_ms,
        }),
    );

    Ok(export)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sitewatch_adapters::{MockOccupancySource, MockScanSource};
    use sitewatch_engine::{CycleOutcome, NoopDispatcher, OccupancySync, ScanSync};
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn exports_occupancy_state() {
        let sync = OccupancySync::new(
            Arc::new(MockOccupancySource::seeded(2, 10, 7)),
            Arc::new(NoopDispatcher),
        );
        let outcome = tokio_test::block_on(sync.poll_now());
        assert_eq!(outcome, CycleOutcome::Updated);

        let dir = tempdir().unwrap();
        let path = dir.path().join("export.json");
        export_to_file(sync.engine(), &path).unwrap();

        let value: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["summary"]["total"], json!(20));
        assert_eq!(value["summary"]["connection"], json!("connected"));
        assert_eq!(value["categories"].as_array().map(Vec::len), Some(2));
        assert_eq!(value["status"]["cycles"], json!(1));
        assert!(value["snapshot"].is_object());
        assert!(value["alerts"].as_array().is_some_and(|a| a.is_empty()));
    }

    #[test]
    fn export_before_first_cycle_is_empty() {
        let sync = ScanSync::new(
            Arc::new(MockScanSource::seeded(["Gate A"], 1)),
            Arc::new(NoopDispatcher),
        );
        let value = export_value(sync.engine()).unwrap();
        assert!(value["snapshot"].is_null());
        assert!(value["stats"].is_null());
        assert_eq!(value["categories"], json!([]));
        assert_eq!(value["summary"]["connection"], json!("disconnected"));
    }
}
