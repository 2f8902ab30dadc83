//! Raw records as returned by a remote fetch boundary.

/// Outcome of a single security scan.
///
/// Ordered by severity so the worst outcome compares greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ScanOutcome {
    /// Nothing found.
    Clear,
    /// Something worth a second look.
    Suspicious,
    /// Confirmed threat.
    Threat,
}

impl ScanOutcome {
    /// Short label for logs and notifications.
    pub fn label(&self) -> &'static str {
        match self {
            ScanOutcome::Clear => "clear",
            ScanOutcome::Suspicious => "suspicious",
            ScanOutcome::Threat => "threat",
        }
    }
}

/// The state carried by a raw record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum RecordState {
    /// An occupancy sensor reading for one slot.
    Occupancy {
        /// Whether the slot is currently taken.
        occupied: bool,
    },
    /// A security scan result.
    Scan {
        /// What the scan found.
        outcome: ScanOutcome,
    },
}

/// One unprocessed record received from the fetch boundary.
///
/// Records are consumed within a single poll cycle. Only the identifier
/// outlives the cycle, inside the engine's idempotency tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawRecord {
    /// Remote identifier. Sensor ids are usually numeric strings.
    pub id: String,
    /// Sensor or scan state.
    pub state: RecordState,
    /// Location or category tag (e.g. "Level 3", "Gate A"), if the backend sent one.
    pub location: Option<String>,
    /// When the backend recorded this reading, in Unix milliseconds.
    pub timestamp_ms: u64,
    /// Free-form detail, used for notable scan records.
    pub detail: Option<String>,
}

impl RawRecord {
    /// Create an occupancy record.
    pub fn occupancy(id: impl Into<String>, occupied: bool) -> Self {
        Self {
            id: id.into(),
            state: RecordState::Occupancy { occupied },
            location: None,
            timestamp_ms: 0,
            detail: None,
        }
    }

    /// Create a scan record.
    pub fn scan(id: impl Into<String>, outcome: ScanOutcome) -> Self {
        Self {
            id: id.into(),
            state: RecordState::Scan { outcome },
            location: None,
            timestamp_ms: 0,
            detail: None,
        }
    }

    /// Set the location tag.
    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the record timestamp.
    pub fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    /// Attach a detail string.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Whether this record counts towards the free/available total.
    ///
    /// Free slots and clear scans are available; everything else is not.
    pub fn is_available(&self) -> bool {
        match self.state {
            RecordState::Occupancy { occupied } => !occupied,
            RecordState::Scan { outcome } => outcome == ScanOutcome::Clear,
        }
    }

    /// The scan outcome, if this is a scan record.
    pub fn scan_outcome(&self) -> Option<ScanOutcome> {
        match self.state {
            RecordState::Scan { outcome } => Some(outcome),
            RecordState::Occupancy { .. } => None,
        }
    }
}
