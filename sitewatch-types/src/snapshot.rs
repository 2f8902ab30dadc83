//! Snapshot - the normalized view of one poll cycle.

use std::fmt;

/// Grouping key for sub-units of a snapshot.
///
/// Levels parsed from location tags (or estimated from sensor ids) are
/// numbered; free-form tags such as "Gate A" are kept by name. Numbered keys
/// sort before named ones so snapshot ordering is total and deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CategoryKey {
    /// A numbered level or zone.
    Numbered(u32),
    /// A named area.
    Named(String),
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryKey::Numbered(n) => write!(f, "Level {}", n),
            CategoryKey::Named(name) => f.write_str(name),
        }
    }
}

impl From<&str> for CategoryKey {
    fn from(name: &str) -> Self {
        CategoryKey::Named(name.to_string())
    }
}

impl From<u32> for CategoryKey {
    fn from(n: u32) -> Self {
        CategoryKey::Numbered(n)
    }
}

/// Availability status of a category.
///
/// Ordered from worst to best, so `a < b` means `b` is an improvement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CategoryStatus {
    /// Nothing free.
    Full,
    /// Free share below the limited threshold.
    Limited,
    /// Plenty free.
    Available,
}

impl CategoryStatus {
    /// Compute a status from counts.
    ///
    /// `Full` when nothing is free, `Limited` when the free share is below
    /// `limited_threshold`, otherwise `Available`.
    pub fn classify(total: u32, available: u32, limited_threshold: f64) -> Self {
        if available == 0 || total == 0 {
            return CategoryStatus::Full;
        }
        let free_ratio = available as f64 / total as f64;
        if free_ratio < limited_threshold {
            CategoryStatus::Limited
        } else {
            CategoryStatus::Available
        }
    }

    /// Returns a short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            CategoryStatus::Full => "full",
            CategoryStatus::Limited => "limited",
            CategoryStatus::Available => "available",
        }
    }
}

/// Aggregated counts for one category.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CategorySummary {
    /// Category key.
    pub key: CategoryKey,
    /// Number of records in the category.
    pub total: u32,
    /// Number of free/nominal records.
    pub available: u32,
    /// Occupied share in `0.0..=1.0`.
    pub occupancy: f64,
    /// Derived status.
    pub status: CategoryStatus,
}

impl CategorySummary {
    /// Build a summary, deriving occupancy and status from the counts.
    pub fn new(key: CategoryKey, total: u32, available: u32, limited_threshold: f64) -> Self {
        let available = available.min(total);
        let occupancy = if total == 0 {
            0.0
        } else {
            (total - available) as f64 / total as f64
        };
        Self {
            key,
            total,
            available,
            occupancy,
            status: CategoryStatus::classify(total, available, limited_threshold),
        }
    }

    /// Number of occupied/non-nominal records.
    pub fn occupied(&self) -> u32 {
        self.total - self.available
    }
}

/// The synchronized state at one poll cycle.
///
/// Snapshots are never mutated after construction. Each cycle produces a
/// new one that replaces the previous one wholesale.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Snapshot {
    /// Unix timestamp in milliseconds when the snapshot was captured.
    pub timestamp_ms: u64,
    /// Total records across all categories.
    pub total: u32,
    /// Free/nominal records across all categories.
    pub available: u32,
    /// Per-category summaries, ordered by key.
    pub categories: Vec<CategorySummary>,
    /// False when this is the last good snapshot republished after a failure.
    pub is_live: bool,
    /// Error annotation for stale snapshots.
    pub error: Option<String>,
}

impl Snapshot {
    /// Create a live snapshot from category summaries.
    ///
    /// Aggregate totals are summed from the categories.
    pub fn new(timestamp_ms: u64, categories: Vec<CategorySummary>) -> Self {
        let total = categories.iter().map(|c| c.total).sum();
        let available = categories.iter().map(|c| c.available).sum();
        Self {
            timestamp_ms,
            total,
            available,
            categories,
            is_live: true,
            error: None,
        }
    }

    /// An empty live snapshot.
    pub fn empty(timestamp_ms: u64) -> Self {
        Self::new(timestamp_ms, Vec::new())
    }

    /// Check if the snapshot has no categories.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Look up a category by key.
    pub fn category(&self, key: &CategoryKey) -> Option<&CategorySummary> {
        self.categories.iter().find(|c| &c.key == key)
    }

    /// Total occupied/non-nominal records.
    pub fn occupied(&self) -> u32 {
        self.total - self.available
    }

    /// Occupied share across the whole snapshot.
    pub fn occupancy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.occupied() as f64 / self.total as f64
        }
    }

    /// Number of categories with the given status.
    pub fn count_with_status(&self, status: CategoryStatus) -> usize {
        self.categories.iter().filter(|c| c.status == status).count()
    }

    /// A copy of this snapshot marked stale with an error annotation.
    pub fn as_stale(&self, error: impl Into<String>) -> Self {
        Self {
            is_live: false,
            error: Some(error.into()),
            ..self.clone()
        }
    }
}
