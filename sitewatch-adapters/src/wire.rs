//! JSON wire format of the facility backend.
//!
//! The backend answers with either a bare array of records or an object
//! with a `records` array. Parking sensors carry an `occupied` flag, scan
//! events a `status` string.

use serde::Deserialize;
use sitewatch_types::{RawRecord, RecordState, ScanOutcome};

use crate::AdapterError;

/// Top-level response body.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    /// `[ {...}, ... ]`
    List(Vec<RecordDto>),
    /// `{ "records": [ {...}, ... ] }`
    Wrapped {
        /// The records.
        records: Vec<RecordDto>,
    },
}

/// Identifiers come as strings or plain numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum IdValue {
    /// `"sensor-12"`
    Text(String),
    /// `12`
    Number(u64),
}

impl IdValue {
    fn into_string(self) -> String {
        match self {
            IdValue::Text(s) => s,
            IdValue::Number(n) => n.to_string(),
        }
    }
}

/// One record as sent by the backend.
#[derive(Debug, Deserialize)]
pub struct RecordDto {
    #[serde(alias = "sensor_id", alias = "event_id")]
    id: IdValue,
    #[serde(default)]
    occupied: Option<bool>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default, alias = "level", alias = "checkpoint")]
    location: Option<String>,
    #[serde(default, alias = "timestamp")]
    timestamp_ms: Option<u64>,
    #[serde(default)]
    detail: Option<String>,
}

impl RecordDto {
    /// Convert into a domain record.
    pub fn into_record(self) -> Result<RawRecord, AdapterError> {
        let id = self.id.into_string();
        let state = match (self.status, self.occupied) {
            (Some(status), _) => RecordState::Scan {
                outcome: parse_outcome(&status).ok_or_else(|| {
                    AdapterError::Parse(format!("record {}: unknown status {:?}", id, status))
                })?,
            },
            (None, Some(occupied)) => RecordState::Occupancy { occupied },
            (None, None) => {
                return Err(AdapterError::Parse(format!(
                    "record {}: neither occupied nor status present",
                    id
                )))
            }
        };
        Ok(RawRecord {
            id,
            state,
            location: self.location,
            timestamp_ms: self.timestamp_ms.unwrap_or(0),
            detail: self.detail,
        })
    }
}

impl Payload {
    /// Convert every record, failing on the first bad one.
    pub fn into_records(self) -> Result<Vec<RawRecord>, AdapterError> {
        let records = match self {
            Payload::List(records) | Payload::Wrapped { records } => records,
        };
        records.into_iter().map(RecordDto::into_record).collect()
    }
}

/// Decode a response body.
pub fn decode(body: &str) -> Result<Vec<RawRecord>, AdapterError> {
    serde_json::from_str::<Payload>(body)
        .map_err(|e| AdapterError::Parse(e.to_string()))?
        .into_records()
}

fn parse_outcome(status: &str) -> Option<ScanOutcome> {
    match status.trim().to_ascii_lowercase().as_str() {
        "clear" | "ok" | "nominal" | "passed" => Some(ScanOutcome::Clear),
        "suspicious" | "warning" | "flagged" => Some(ScanOutcome::Suspicious),
        "threat" | "alert" | "critical" => Some(ScanOutcome::Threat),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_bare_array_of_sensors() {
        let body = r#"[
            {"sensor_id": 12, "occupied": true, "level": "Level 2", "timestamp": 1700000000000},
            {"id": "s-13", "occupied": false}
        ]"#;
        let records = decode(body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "12");
        assert_eq!(records[0].location.as_deref(), Some("Level 2"));
        assert_eq!(records[0].timestamp_ms, 1_700_000_000_000);
        assert!(!records[0].is_available());
        assert!(records[1].is_available());
    }

    #[test]
    fn decodes_wrapped_scan_events() {
        let body = r#"{"records": [
            {"event_id": "evt-1", "status": "THREAT", "checkpoint": "Gate A", "detail": "blade"},
            {"event_id": "evt-2", "status": "ok"}
        ]}"#;
        let records = decode(body).unwrap();
        assert_eq!(records[0].scan_outcome(), Some(ScanOutcome::Threat));
        assert_eq!(records[0].detail.as_deref(), Some("blade"));
        assert_eq!(records[1].scan_outcome(), Some(ScanOutcome::Clear));
    }

    #[test]
    fn rejects_unknown_status_and_missing_state() {
        let err = decode(r#"[{"id": "x", "status": "melted"}]"#).unwrap_err();
        assert!(err.to_string().contains("unknown status"));

        let err = decode(r#"[{"id": "x"}]"#).unwrap_err();
        assert!(err.to_string().contains("neither occupied nor status"));

        assert!(matches!(decode("{not json"), Err(AdapterError::Parse(_))));
    }
}
