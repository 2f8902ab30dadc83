//! Snapshot transformer: raw records to a normalized snapshot.

use std::collections::BTreeMap;

use sitewatch_types::{CategoryKey, CategorySummary, RawRecord, Snapshot};

use crate::config::TransformConfig;

/// Group raw records into a snapshot.
///
/// Pure and deterministic: the same records and config always give the same
/// snapshot, with categories ordered by key. `captured_at_ms` is copied into
/// the snapshot as-is.
pub fn transform(records: &[RawRecord], config: &TransformConfig, captured_at_ms: u64) -> Snapshot {
    // key -> (total, available)
    let mut groups: BTreeMap<CategoryKey, (u32, u32)> = BTreeMap::new();

    for record in records {
        let counts = groups.entry(category_for(record, config)).or_default();
        counts.0 = counts.0.saturating_add(1);
        if record.is_available() {
            counts.1 = counts.1.saturating_add(1);
        }
    }

    let categories = groups
        .into_iter()
        .map(|(key, (total, available))| {
            CategorySummary::new(key, total, available, config.limited_threshold)
        })
        .collect();

    Snapshot::new(captured_at_ms, categories)
}

/// Derive the category key of one record.
///
/// A location tag wins: its last run of digits becomes a numbered level,
/// otherwise the trimmed tag is used by name. Without a tag the level is
/// estimated from the digits in the record id, `id / bucket_size`, offset by
/// the lowest level. Numbered keys are always clamped into range.
pub fn category_for(record: &RawRecord, config: &TransformConfig) -> CategoryKey {
    if let Some(tag) = record.location.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        return match last_number(tag) {
            Some(n) => CategoryKey::Numbered(config.clamp_category(n)),
            None => CategoryKey::Named(tag.to_string()),
        };
    }

    let level = match last_number(&record.id) {
        Some(n) => (n / config.bucket_size.max(1) as u64).saturating_add(config.min_category as u64),
        None => config.min_category as u64,
    };
    CategoryKey::Numbered(config.clamp_category(level))
}

/// Check records for problems that make a batch unusable.
pub fn validate(records: &[RawRecord]) -> Result<(), String> {
    match records.iter().position(|r| r.id.trim().is_empty()) {
        Some(index) => Err(format!("record {} has an empty id", index)),
        None => Ok(()),
    }
}

/// The value of the last run of ASCII digits in `s`, saturating on overflow.
fn last_number(s: &str) -> Option<u64> {
    let end = s.rfind(|c: char| c.is_ascii_digit())? + 1;
    let start = s[..end].trim_end_matches(|c: char| c.is_ascii_digit()).len();
    Some(s[start..end].parse().unwrap_or(u64::MAX))
}
