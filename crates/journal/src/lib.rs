//! Per-folder result logs
//!
//! This crate provides:
//! - `AnalysisRecord`: one timestamped result line
//! - `ResultLog`: append-only `log.txt` per image folder, with per-file locking

pub mod journal;
pub mod record;

// Re-exports
pub use journal::{ResultLog, LOG_FILE_NAME};
pub use record::{AnalysisRecord, TIMESTAMP_FORMAT};

/// Result type for journal operations
pub type Result<T> = anyhow::Result<T>;
