//! Shared building blocks for Lookout
//!
//! This crate provides:
//! - Settings loaded from the INI template (prompt, rules, backend selection)
//! - The `Analyzer` seam implemented by every vendor backend
//! - Typed errors for configuration and analysis failures

pub mod analyzer;
pub mod settings;
pub mod error;

// Re-exports
pub use analyzer::{Analyzer, Retrying};
pub use settings::{BackendKind, BackendSettings, Settings, VendorSettings, WatchConfig, WatcherSettings};
pub use error::{AnalysisError, ConfigError, ErrorKind};
