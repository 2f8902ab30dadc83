//! # sitewatch-engine
//!
//! A polling sync engine for facility monitoring.
//!
//! A [`SyncEngine`] repeatedly fetches raw records from a [`RecordSource`],
//! turns them into a [`Snapshot`](sitewatch_types::Snapshot), compares it to
//! the previous one and fans the result out to subscribers on four
//! channels: snapshots, connection state, alerts and statistics. Semantic
//! changes are handed to a [`NotificationDispatcher`].
//!
//! Two ready-made instantiations cover the common cases:
//!
//! - [`OccupancySync`] for parking sensors (10s interval, no alerts)
//! - [`ScanSync`] for checkpoint scanners (5s interval, anomaly alerts)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use sitewatch_engine::{NoopDispatcher, OccupancySync, RecordSource};
//!
//! # async fn run(source: Arc<dyn RecordSource>) {
//! let sync = OccupancySync::new(source, Arc::new(NoopDispatcher));
//!
//! let _status = sync.subscribe_connection(|state| println!("connection: {}", state));
//! let _snapshots = sync.subscribe_snapshots(|snapshot| {
//!     for level in &snapshot.categories {
//!         println!("{}: {}/{} free", level.key, level.available, level.total);
//!     }
//! });
//! # }
//! ```
//!
//! The pure building blocks ([`transform`], [`detect`], [`detect_notable`],
//! [`IdempotencyTracker`], [`ConnectionMachine`]) are exported for callers
//! that want to drive cycles themselves.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod alerts;
mod config;
mod connection;
mod detect;
mod dispatch;
mod engine;
mod error;
mod history;
mod occupancy;
mod registry;
mod scan;
mod source;
mod tracker;
mod transform;

pub use alerts::AlertLog;
pub use config::{
    clamp_interval, EngineConfig, NotablePolicy, NotificationPolicy, RetryPolicy, TransformConfig,
    MAX_POLL_INTERVAL, MIN_POLL_INTERVAL,
};
pub use connection::{ConnectionMachine, Transition};
pub use detect::{detect, detect_notable};
pub use dispatch::{NoopDispatcher, NotificationDispatcher, NotificationPayload};
pub use engine::{CycleOutcome, ServiceStatus, SyncEngine, SyncEngineBuilder};
pub use error::{DispatchError, EngineError, FetchError};
pub use history::History;
pub use occupancy::OccupancySync;
pub use registry::{ChannelKind, Registry, Subscription};
pub use scan::ScanSync;
pub use source::RecordSource;
pub use tracker::IdempotencyTracker;
pub use transform::{category_for, transform, validate};

// Re-export types for convenience
pub use sitewatch_types;
