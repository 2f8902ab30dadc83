//! Mock record sources for demos, drills and tests.
//!
//! All mocks are seeded so runs are reproducible.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sitewatch_engine::{FetchError, RecordSource};
use sitewatch_types::{RawRecord, ScanOutcome};

const DEFAULT_SEED: u64 = 0x51_7e_3a_7c;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A parking garage whose slots flip between free and occupied.
#[derive(Debug)]
pub struct MockOccupancySource {
    levels: u32,
    per_level: u32,
    churn: f64,
    state: Mutex<OccupancyState>,
}

#[derive(Debug)]
struct OccupancyState {
    rng: StdRng,
    occupied: Vec<bool>,
}

impl MockOccupancySource {
    /// A garage with `levels` levels of `per_level` slots each.
    pub fn new(levels: u32, per_level: u32) -> Self {
        Self::seeded(levels, per_level, DEFAULT_SEED)
    }

    /// Same as [`new`](Self::new) with an explicit seed.
    pub fn seeded(levels: u32, per_level: u32, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let slots = (levels * per_level) as usize;
        let occupied = (0..slots).map(|_| rng.gen_bool(0.7)).collect();
        Self {
            levels,
            per_level,
            churn: 0.1,
            state: Mutex::new(OccupancyState { rng, occupied }),
        }
    }

    /// Probability that a slot flips on each poll (default 0.1).
    pub fn with_churn(mut self, churn: f64) -> Self {
        self.churn = churn.clamp(0.0, 1.0);
        self
    }

    /// Number of slots.
    pub fn slots(&self) -> u32 {
        self.levels * self.per_level
    }
}

#[async_trait]
impl RecordSource for MockOccupancySource {
    async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError> {
        let now = now_ms();
        let mut state = self.state.lock();
        let OccupancyState { rng, occupied } = &mut *state;

        for slot in occupied.iter_mut() {
            if rng.gen_bool(self.churn) {
                *slot = !*slot;
            }
        }

        let per_level = self.per_level.max(1) as usize;
        Ok(occupied
            .iter()
            .enumerate()
            .map(|(i, occupied)| {
                let level = i / per_level + 1;
                RawRecord::occupancy(format!("sensor-{}", i), *occupied)
                    .at(format!("Level {}", level))
                    .with_timestamp(now)
            })
            .collect())
    }

    fn description(&self) -> &str {
        "mock garage"
    }
}

/// A set of checkpoints producing scan events.
///
/// Each poll appends a few new scans and returns the most recent `window`
/// of them, so consecutive polls overlap.
#[derive(Debug)]
pub struct MockScanSource {
    checkpoints: Vec<String>,
    per_poll: usize,
    window: usize,
    anomaly_rate: f64,
    state: Mutex<ScanState>,
}

#[derive(Debug)]
struct ScanState {
    rng: StdRng,
    next_id: u64,
    recent: VecDeque<RawRecord>,
}

const ANOMALY_DETAILS: &[&str] = &[
    "dense object in bag",
    "liquid over limit",
    "metal object",
    "unattended item",
    "tamper alarm",
];

impl MockScanSource {
    /// Scans at the given checkpoints.
    pub fn new<I, S>(checkpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::seeded(checkpoints, DEFAULT_SEED)
    }

    /// Same as [`new`](Self::new) with an explicit seed.
    pub fn seeded<I, S>(checkpoints: I, seed: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut checkpoints: Vec<String> = checkpoints.into_iter().map(Into::into).collect();
        if checkpoints.is_empty() {
            checkpoints.push("Gate A".to_string());
        }
        Self {
            checkpoints,
            per_poll: 3,
            window: 20,
            anomaly_rate: 0.1,
            state: Mutex::new(ScanState {
                rng: StdRng::seed_from_u64(seed),
                next_id: 1,
                recent: VecDeque::new(),
            }),
        }
    }

    /// Maximum number of new scans per poll (default 3).
    pub fn with_per_poll(mut self, per_poll: usize) -> Self {
        self.per_poll = per_poll;
        self
    }

    /// Number of recent scans returned by each poll (default 20).
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    /// Share of scans that are suspicious or threats (default 0.1).
    pub fn with_anomaly_rate(mut self, rate: f64) -> Self {
        self.anomaly_rate = rate.clamp(0.0, 1.0);
        self
    }
}

#[async_trait]
impl RecordSource for MockScanSource {
    async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError> {
        let now = now_ms();
        let mut state = self.state.lock();
        let ScanState { rng, next_id, recent } = &mut *state;

        let count = rng.gen_range(0..=self.per_poll);
        for _ in 0..count {
            let roll: f64 = rng.gen();
            let outcome = if roll < self.anomaly_rate * 0.25 {
                ScanOutcome::Threat
            } else if roll < self.anomaly_rate {
                ScanOutcome::Suspicious
            } else {
                ScanOutcome::Clear
            };

            let checkpoint = &self.checkpoints[rng.gen_range(0..self.checkpoints.len())];
            let mut record = RawRecord::scan(format!("scan-{}", next_id), outcome)
                .at(checkpoint.as_str())
                .with_timestamp(now);
            if outcome != ScanOutcome::Clear {
                record = record.with_detail(ANOMALY_DETAILS[rng.gen_range(0..ANOMALY_DETAILS.len())]);
            }
            *next_id += 1;

            recent.push_back(record);
            while recent.len() > self.window {
                recent.pop_front();
            }
        }

        Ok(recent.iter().cloned().collect())
    }

    fn description(&self) -> &str {
        "mock checkpoints"
    }
}

/// Fails a number of times, then hands over to another source.
///
/// Useful for rehearsing outages: the engine should report stale data,
/// move to `Error` after enough failures, and recover afterwards.
#[derive(Debug)]
pub struct FailingSource {
    inner: Arc<dyn RecordSource>,
    remaining: AtomicU32,
    error: FetchError,
}

impl FailingSource {
    /// Fail `failures` times with a connection error, then delegate.
    pub fn new(inner: Arc<dyn RecordSource>, failures: u32) -> Self {
        Self {
            inner,
            remaining: AtomicU32::new(failures),
            error: FetchError::Connection("simulated outage".to_string()),
        }
    }

    /// Use a different error for the simulated failures.
    pub fn with_error(mut self, error: FetchError) -> Self {
        self.error = error;
        self
    }

    /// Failures still to come.
    pub fn remaining(&self) -> u32 {
        self.remaining.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordSource for FailingSource {
    async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError> {
        let failing = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(self.error.clone());
        }
        self.inner.fetch().await
    }

    fn description(&self) -> &str {
        self.inner.description()
    }
}
