//! Change events derived from consecutive snapshots or notable records.

use crate::{CategoryKey, CategoryStatus, ScanOutcome};

/// Tag identifying what kind of notification is being dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EventKind {
    /// Aggregate free count went up.
    AvailabilityIncreased,
    /// A category moved to a better status.
    CategoryImproved,
    /// A notable (anomalous) record was observed for the first time.
    NotableRecord,
    /// The engine (re)connected to the backend.
    ConnectionEstablished,
    /// The engine gave up after repeated failures.
    ConnectionLost,
}

impl EventKind {
    /// Stable identifier, used as notification channel ids and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::AvailabilityIncreased => "availability_increased",
            EventKind::CategoryImproved => "category_improved",
            EventKind::NotableRecord => "notable_record",
            EventKind::ConnectionEstablished => "connection_established",
            EventKind::ConnectionLost => "connection_lost",
        }
    }
}

/// A semantic fact derived by the change detector.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum ChangeEvent {
    /// The aggregate available count increased.
    AvailabilityIncreased {
        /// Available count in the previous snapshot.
        previous: u32,
        /// Available count in the new snapshot.
        current: u32,
        /// `current - previous`.
        delta: u32,
    },
    /// A category present in both snapshots moved to a better status.
    CategoryImproved {
        /// The category.
        category: CategoryKey,
        /// Status in the previous snapshot.
        from: CategoryStatus,
        /// Status in the new snapshot.
        to: CategoryStatus,
        /// Free count in the new snapshot.
        available: u32,
        /// Total count in the new snapshot.
        total: u32,
    },
    /// A record matching the notable predicate was seen for the first time.
    NotableRecord {
        /// Remote record identifier.
        record_id: String,
        /// Category the record belongs to.
        category: CategoryKey,
        /// Scan outcome, when the record is a scan.
        outcome: Option<ScanOutcome>,
        /// Detail string from the backend.
        detail: Option<String>,
        /// Record timestamp in Unix milliseconds.
        timestamp_ms: u64,
    },
}

impl ChangeEvent {
    /// The notification kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            ChangeEvent::AvailabilityIncreased { .. } => EventKind::AvailabilityIncreased,
            ChangeEvent::CategoryImproved { .. } => EventKind::CategoryImproved,
            ChangeEvent::NotableRecord { .. } => EventKind::NotableRecord,
        }
    }

    /// The category this event refers to, if any.
    pub fn category(&self) -> Option<&CategoryKey> {
        match self {
            ChangeEvent::AvailabilityIncreased { .. } => None,
            ChangeEvent::CategoryImproved { category, .. } => Some(category),
            ChangeEvent::NotableRecord { category, .. } => Some(category),
        }
    }

    /// The record this event refers to, if any.
    pub fn record_id(&self) -> Option<&str> {
        match self {
            ChangeEvent::NotableRecord { record_id, .. } => Some(record_id),
            _ => None,
        }
    }

    /// Short human-readable title.
    pub fn title(&self) -> String {
        match self {
            ChangeEvent::AvailabilityIncreased { .. } => "More spaces available".to_string(),
            ChangeEvent::CategoryImproved { category, .. } => {
                format!("{} has space again", category)
            }
            ChangeEvent::NotableRecord { outcome, .. } => match outcome {
                Some(ScanOutcome::Threat) => "Threat detected".to_string(),
                _ => "Suspicious scan".to_string(),
            },
        }
    }

    /// Human-readable body text.
    pub fn body(&self) -> String {
        match self {
            ChangeEvent::AvailabilityIncreased { current, delta, .. } => {
                format!("{} more free ({} available now)", delta, current)
            }
            ChangeEvent::CategoryImproved {
                category,
                from,
                to,
                available,
                total,
            } => format!(
                "{} went from {} to {} ({}/{} free)",
                category,
                from.label(),
                to.label(),
                available,
                total
            ),
            ChangeEvent::NotableRecord {
                record_id,
                category,
                detail,
                ..
            } => match detail {
                Some(detail) => format!("{} at {}: {}", record_id, category, detail),
                None => format!("{} at {}", record_id, category),
            },
        }
    }
}
