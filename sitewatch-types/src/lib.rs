//! # sitewatch-types
//!
//! Core types for facility synchronization. This crate defines the values
//! that flow through a sitewatch engine: the raw records a backend returns,
//! the normalized snapshots built from them, the change events derived from
//! consecutive snapshots, and the alerts raised for notable records.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Core types work without any serialization framework
//! - **Optional serialization**: Enable the `serde` feature for JSON export and wire DTOs
//! - **Immutable snapshots**: A snapshot is built once per poll cycle and replaced wholesale
//!
//! ## Example
//!
//! ```rust
//! use sitewatch_types::{CategoryKey, CategoryStatus, CategorySummary, Snapshot};
//!
//! let snapshot = Snapshot::new(
//!     1_700_000_000_000,
//!     vec![CategorySummary::new(CategoryKey::Numbered(1), 10, 3, 0.2)],
//! );
//!
//! assert_eq!(snapshot.total, 10);
//! assert_eq!(snapshot.available, 3);
//! assert_eq!(snapshot.categories[0].status, CategoryStatus::Available);
//! ```

mod alert;
mod connection;
mod event;
mod record;
mod snapshot;
mod stats;

pub use alert::*;
pub use connection::*;
pub use event::*;
pub use record::*;
pub use snapshot::*;
pub use stats::*;
