//! # sitewatch-adapters
//!
//! Ready-made record sources and notification dispatchers for
//! [`sitewatch_engine`].
//!
//! ## Record sources
//!
//! - [`HttpSource`](http::HttpSource) (`http` feature) - polls a JSON
//!   endpoint, optionally with a bearer token
//! - [`MockOccupancySource`] - a seeded parking garage whose slots churn
//! - [`MockScanSource`] - seeded checkpoints with occasional anomalies and
//!   overlapping result windows
//! - [`FailingSource`] - fails a few times, then delegates
//!
//! ## Dispatchers
//!
//! - [`LogDispatcher`] - logs every notification through `tracing`
//! - [`ChannelDispatcher`] - forwards into a bounded tokio channel
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use sitewatch_adapters::{LogDispatcher, MockOccupancySource};
//! use sitewatch_engine::OccupancySync;
//!
//! #[tokio::main]
//! async fn main() {
//!     let sync = OccupancySync::new(
//!         Arc::new(MockOccupancySource::new(4, 50)),
//!         Arc::new(LogDispatcher),
//!     );
//!
//!     let _sub = sync.subscribe_snapshots(|snapshot| {
//!         println!("{} of {} spaces free", snapshot.available, snapshot.total);
//!     });
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//! }
//! ```

pub mod dispatch;
pub mod error;
pub mod mock;
pub mod wire;

#[cfg(feature = "http")]
pub mod http;

pub use dispatch::{ChannelDispatcher, LogDispatcher, Notification};
pub use error::AdapterError;
pub use mock::{FailingSource, MockOccupancySource, MockScanSource};

// Re-export types for convenience
pub use sitewatch_types::{RawRecord, Snapshot};
