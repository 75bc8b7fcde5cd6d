//! sweep-core library.
//!
//! Deduplication engine for broadcast campaigns and per-recipient
//! notifications, plus the SQLite store it runs against.

pub mod config;
pub mod db;
pub mod dedup;
pub mod error;
pub mod lock;
pub mod model;
pub mod report;
pub mod store;

/// # Conventions
///
/// - **Errors**: `thiserror` enums for engine failures, each carrying an
///   [`error::ErrorCode`]; `anyhow::Result` for config and store-opening glue.
/// - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).
/// - **Time**: the reference instant of a run is always passed in, never read
///   from the clock inside the engine.
pub use report::{CleanupOptions, CleanupReport, CleanupReporter};
