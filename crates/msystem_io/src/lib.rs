//! # M System IO
//!
//! I/O layer for the M System simulator.
//!
//! This crate provides:
//! - Structured error handling with custom error types
//! - JSON helpers and descriptor loading
//! - The run log sink (notifications, snapshots, summary lines)

/// Error types and result aliases for I/O operations
pub mod error;
/// Run log directory with synchronised append-only sinks
pub mod history;
/// JSON helpers and descriptor loading
pub mod serialization;

pub use error::{IoError, Result};
pub use history::{LogRecord, RunLogger};
pub use serialization::{
    from_json, load_description, load_system, read_json_file, to_json, to_json_pretty,
    write_json_file,
};
