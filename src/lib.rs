//! # sitewatch
//!
//! A command-line facility monitor built on [`sitewatch_engine`].
//!
//! The binary polls either parking occupancy sensors or checkpoint scanners,
//! logs every snapshot, connection change and alert, and can export the
//! state after a single cycle.
//!
//! ```text
//! settings.json ─┐
//! SITEWATCH_*  ──┼─▶ Settings ─▶ app::build_engine ─▶ SyncEngine ─▶ subscribers
//! CLI flags    ──┘                  │                     │
//!                        HttpSource | mock source     LogDispatcher
//! ```
//!
//! - **[`settings`]**: the persisted settings blob
//! - **[`app`]**: picks a record source and instantiation for the settings
//! - **[`export`]**: one-shot JSON export
//!
//! ## Usage
//!
//! ```bash
//! # Watch a mock garage
//! sitewatch
//!
//! # Watch a real scan feed every 3 seconds
//! sitewatch --mode scan --endpoint https://facility.example.com/api/scans --interval-ms 3000
//!
//! # Poll once and export
//! sitewatch --export state.json
//! ```

pub mod app;
pub mod export;
pub mod settings;

pub use app::build_engine;
pub use export::export_to_file;
pub use settings::{Mode, Settings};

// Re-export the engine for library users
pub use sitewatch_engine;
