//! Change detection between consecutive snapshots and over raw records.

use sitewatch_types::{ChangeEvent, RawRecord, Snapshot};

use crate::config::{NotablePolicy, TransformConfig};
use crate::transform::category_for;
use crate::tracker::IdempotencyTracker;

/// Compare two chronologically adjacent snapshots.
///
/// Without a previous snapshot nothing is reported: the first cycle only
/// establishes the baseline. Only improvements are reported; a category
/// getting worse shows up in the new snapshot but raises no event.
pub fn detect(previous: Option<&Snapshot>, next: &Snapshot) -> Vec<ChangeEvent> {
    let Some(previous) = previous else {
        return Vec::new();
    };

    let mut events = Vec::new();

    if next.available > previous.available {
        events.push(ChangeEvent::AvailabilityIncreased {
            previous: previous.available,
            current: next.available,
            delta: next.available - previous.available,
        });
    }

    for category in &next.categories {
        let Some(before) = previous.category(&category.key) else {
            continue;
        };
        if category.status > before.status {
            events.push(ChangeEvent::CategoryImproved {
                category: category.key.clone(),
                from: before.status,
                to: category.status,
                available: category.available,
                total: category.total,
            });
        }
    }

    events
}

/// Report notable records that have not been seen before.
///
/// Each notable identifier yields exactly one event for as long as the
/// tracker retains it, regardless of later changes in its state. Records
/// that are not notable never enter the tracker.
pub fn detect_notable(
    records: &[RawRecord],
    tracker: &mut IdempotencyTracker,
    policy: &NotablePolicy,
    transform: &TransformConfig,
) -> Vec<ChangeEvent> {
    if policy.is_empty() {
        return Vec::new();
    }

    records
        .iter()
        .filter(|record| policy.is_notable(record))
        .filter(|record| tracker.insert(&record.id))
        .map(|record| ChangeEvent::NotableRecord {
            record_id: record.id.clone(),
            category: category_for(record, transform),
            outcome: record.scan_outcome(),
            detail: record.detail.clone(),
            timestamp_ms: record.timestamp_ms,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use sitewatch_types::{CategoryKey, CategoryStatus, CategorySummary, ScanOutcome};

    use super::*;
    use crate::transform::transform;

    fn snapshot(categories: &[(&str, u32, u32)]) -> Snapshot {
        Snapshot::new(
            0,
            categories
                .iter()
                .map(|(name, total, available)| {
                    CategorySummary::new(CategoryKey::from(*name), *total, *available, 0.2)
                })
                .collect(),
        )
    }

    #[test]
    fn first_observation_is_silent() {
        let records = vec![
            RawRecord::occupancy("a", false).at("Level 1"),
            RawRecord::scan("b", ScanOutcome::Threat).at("Gate A"),
        ];
        let next = transform(&records, &TransformConfig::default(), 0);
        assert!(detect(None, &next).is_empty());
        assert!(detect(None, &transform(&[], &TransformConfig::default(), 0)).is_empty());
    }

    #[test]
    fn full_to_available_is_one_event() {
        let before = snapshot(&[("A", 10, 0), ("B", 10, 5)]);
        let after = snapshot(&[("A", 10, 3), ("B", 10, 5)]);

        let events = detect(Some(&before), &after);
        let improved: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, ChangeEvent::CategoryImproved { .. }))
            .collect();
        assert_eq!(improved.len(), 1);
        assert_eq!(
            improved[0],
            &ChangeEvent::CategoryImproved {
                category: CategoryKey::from("A"),
                from: CategoryStatus::Full,
                to: CategoryStatus::Available,
                available: 3,
                total: 10,
            }
        );
        assert!(events.contains(&ChangeEvent::AvailabilityIncreased {
            previous: 5,
            current: 8,
            delta: 3,
        }));
    }

    #[test]
    fn no_event_when_availability_drops_or_holds() {
        let before = snapshot(&[("A", 10, 5)]);
        assert!(detect(Some(&before), &snapshot(&[("A", 10, 5)])).is_empty());
        assert!(detect(Some(&before), &snapshot(&[("A", 10, 0)])).is_empty());
    }

    #[test]
    fn degradation_is_not_reported() {
        let before = snapshot(&[("A", 10, 5), ("B", 10, 0)]);
        let after = snapshot(&[("A", 10, 0), ("B", 10, 1)]);
        let events = detect(Some(&before), &after);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            ChangeEvent::CategoryImproved { category, to: CategoryStatus::Limited, .. }
                if category == &CategoryKey::from("B")
        ));
    }

    #[test]
    fn new_categories_are_not_improvements() {
        let before = snapshot(&[("A", 10, 5)]);
        let after = snapshot(&[("A", 10, 5), ("B", 10, 10)]);
        let events = detect(Some(&before), &after);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), sitewatch_types::EventKind::AvailabilityIncreased);
    }

    #[test]
    fn notable_records_are_edge_triggered() {
        let mut tracker = IdempotencyTracker::new(100);
        let policy = NotablePolicy::anomalous_scans();
        let transform = TransformConfig::default();

        let first = vec![
            RawRecord::scan("evt-1", ScanOutcome::Threat).at("Gate A").with_detail("knife"),
            RawRecord::scan("evt-2", ScanOutcome::Clear).at("Gate A"),
        ];
        let events = detect_notable(&first, &mut tracker, &policy, &transform);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].record_id(), Some("evt-1"));
        assert!(!tracker.contains("evt-2"));

        // Overlapping window: evt-1 again, now only suspicious.
        let second = vec![
            RawRecord::scan("evt-1", ScanOutcome::Suspicious).at("Gate A"),
            RawRecord::scan("evt-3", ScanOutcome::Suspicious).at("Gate B"),
            RawRecord::scan("evt-3", ScanOutcome::Suspicious).at("Gate B"),
        ];
        let events = detect_notable(&second, &mut tracker, &policy, &transform);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].record_id(), Some("evt-3"));
        assert_eq!(events[0].category(), Some(&CategoryKey::from("Gate B")));
    }

    #[test]
    fn empty_policy_never_touches_tracker() {
        let mut tracker = IdempotencyTracker::new(10);
        let records = vec![RawRecord::scan("evt-1", ScanOutcome::Threat)];
        let events = detect_notable(&records, &mut tracker, &NotablePolicy::none(), &TransformConfig::default());
        assert!(events.is_empty());
        assert!(tracker.is_empty());
    }
}
