//! Aggregate statistics published alongside snapshots.

use crate::{CategoryStatus, Snapshot};

/// Direction of the available count over recent cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Trend {
    /// More free than the previous cycle.
    Rising,
    /// Fewer free than the previous cycle.
    Falling,
    /// Unchanged, or not enough history yet.
    #[default]
    Steady,
}

/// Aggregate statistics for the stats channel.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stats {
    /// Timestamp of the snapshot these stats describe.
    pub timestamp_ms: u64,
    /// Total records.
    pub total: u32,
    /// Free/nominal records.
    pub available: u32,
    /// Occupied/non-nominal records.
    pub occupied: u32,
    /// Occupied share in `0.0..=1.0`.
    pub occupancy: f64,
    /// Number of categories.
    pub categories: usize,
    /// Categories with nothing free.
    pub full_categories: usize,
    /// Categories below the limited threshold.
    pub limited_categories: usize,
    /// Notable records seen since the engine was created or reset.
    pub notable_seen: u64,
    /// Alerts not yet acknowledged.
    pub open_alerts: usize,
    /// Direction of the available count.
    pub trend: Trend,
    /// Change in available records per second over the last two cycles.
    pub rate_per_sec: Option<f64>,
    /// Successful cycles so far.
    pub cycles: u64,
    /// Failed fetch attempts so far.
    pub failed_attempts: u64,
}

impl Stats {
    /// Derive the snapshot-dependent fields. Counters start at zero.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            timestamp_ms: snapshot.timestamp_ms,
            total: snapshot.total,
            available: snapshot.available,
            occupied: snapshot.occupied(),
            occupancy: snapshot.occupancy(),
            categories: snapshot.len(),
            full_categories: snapshot.count_with_status(CategoryStatus::Full),
            limited_categories: snapshot.count_with_status(CategoryStatus::Limited),
            ..Self::default()
        }
    }
}
