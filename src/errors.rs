//! Store error types
//!
//! Error codes:
//! - TAXII_CONNECTION_FAILED (FATAL)
//! - TAXII_LOAD_FAILED (FATAL)
//! - TAXII_INITIALIZATION_FAILED (FATAL)
//! - TAXII_STORE_CORRUPTION (FATAL)
//! - TAXII_CONFIG_INVALID (FATAL)
//! - TAXII_INVALID_FILTER (REJECT)
//! - TAXII_CONFLICT (REJECT)
//! - TAXII_NOT_FOUND (REJECT)
//! - TAXII_INVALID_OBJECT (REJECT)
//! - TAXII_IO_ERROR (ERROR)

use std::fmt;

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Severity levels for store errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Caller's request rejected, store unchanged
    Reject,
    /// Operation failed, store keeps serving
    Error,
    /// Store must not come up (or must stop serving)
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Store errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Physical store unreachable at startup
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Malformed or inconsistent snapshot
    #[error("Load failed: {0}")]
    Load(String),

    /// Consistency check rejected the loaded store
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// Filter key outside the allowed set, or an unparseable filter value
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Duplicate key with divergent content
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Requested api root, collection, object or version absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Object body failed validation
    #[error("Invalid object: {0}")]
    InvalidObject(String),

    /// Persisted data failed verification
    #[error("Store corruption: {0}")]
    Corruption(String),

    /// Configuration rejected
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl StoreError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Connection(_) => "TAXII_CONNECTION_FAILED",
            StoreError::Load(_) => "TAXII_LOAD_FAILED",
            StoreError::Initialization(_) => "TAXII_INITIALIZATION_FAILED",
            StoreError::InvalidFilter(_) => "TAXII_INVALID_FILTER",
            StoreError::Conflict(_) => "TAXII_CONFLICT",
            StoreError::NotFound(_) => "TAXII_NOT_FOUND",
            StoreError::InvalidObject(_) => "TAXII_INVALID_OBJECT",
            StoreError::Corruption(_) => "TAXII_STORE_CORRUPTION",
            StoreError::Config(_) => "TAXII_CONFIG_INVALID",
            StoreError::Io(_) => "TAXII_IO_ERROR",
        }
    }

    /// Severity of this error
    pub fn severity(&self) -> Severity {
        match self {
            StoreError::Connection(_)
            | StoreError::Load(_)
            | StoreError::Initialization(_)
            | StoreError::Corruption(_)
            | StoreError::Config(_) => Severity::Fatal,
            StoreError::InvalidFilter(_)
            | StoreError::Conflict(_)
            | StoreError::NotFound(_)
            | StoreError::InvalidObject(_) => Severity::Reject,
            StoreError::Io(_) => Severity::Error,
        }
    }

    /// Returns whether this error must stop the store from serving
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    pub fn load(message: impl Into<String>) -> Self {
        StoreError::Load(message.into())
    }

    pub fn invalid_filter(message: impl Into<String>) -> Self {
        StoreError::InvalidFilter(message.into())
    }

    pub fn invalid_object(message: impl Into<String>) -> Self {
        StoreError::InvalidObject(message.into())
    }

    /// Lock poisoning means a writer panicked mid-update
    pub(crate) fn poisoned(what: &str) -> Self {
        StoreError::Corruption(format!("lock poisoned: {}", what))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_errors_are_fatal() {
        assert!(StoreError::Connection("refused".into()).is_fatal());
        assert!(StoreError::load("missing discovery").is_fatal());
        assert!(StoreError::Initialization("no manifest".into()).is_fatal());
    }

    #[test]
    fn test_request_errors_are_rejections() {
        assert_eq!(
            StoreError::invalid_filter("match[foo]").severity(),
            Severity::Reject
        );
        assert_eq!(StoreError::Conflict("dup".into()).severity(), Severity::Reject);
        assert_eq!(StoreError::NotFound("c1".into()).severity(), Severity::Reject);
    }

    #[test]
    fn test_display_contains_message() {
        let err = StoreError::invalid_filter("match[foo] not allowed");
        assert_eq!(err.code(), "TAXII_INVALID_FILTER");
        assert!(err.to_string().contains("match[foo] not allowed"));
    }
}
