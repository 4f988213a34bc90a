//! Error types for Lookout

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating settings
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed INI: {0}")]
    Syntax(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Category of an analysis failure
///
/// Backends map transport and vendor failures onto one of these so the
/// dispatcher can decide about retries without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection, DNS, timeout or 5xx failures
    Network,
    /// Missing or rejected API key
    Auth,
    /// Vendor returned 429
    RateLimited,
    /// Response body did not have the expected shape
    MalformedResponse,
    /// Reading or decoding the local image failed
    LocalIo,
}

impl ErrorKind {
    /// Whether a later attempt can reasonably succeed
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Network | ErrorKind::RateLimited)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Auth => "auth",
            ErrorKind::RateLimited => "rate-limited",
            ErrorKind::MalformedResponse => "malformed-response",
            ErrorKind::LocalIo => "local-io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed analysis: what went wrong and a human-readable message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} error: {message}")]
pub struct AnalysisError {
    kind: ErrorKind,
    message: String,
}

impl AnalysisError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedResponse, message)
    }

    pub fn local_io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LocalIo, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl From<std::io::Error> for AnalysisError {
    fn from(err: std::io::Error) -> Self {
        Self::local_io(err.to_string())
    }
}
