//! CLI-specific error types

use std::fmt;
use std::io;

use crate::errors::StoreError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdin/stdout)
    IoError,
    /// Store refused to start
    BootFailed,
    /// Store rejected the request
    RequestFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "TAXII_CLI_CONFIG_ERROR",
            Self::IoError => "TAXII_CLI_IO_ERROR",
            Self::BootFailed => "TAXII_CLI_BOOT_FAILED",
            Self::RequestFailed => "TAXII_CLI_REQUEST_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        let code = match &e {
            StoreError::Config(_) => CliErrorCode::ConfigError,
            e if e.is_fatal() => CliErrorCode::BootFailed,
            _ => CliErrorCode::RequestFailed,
        };
        Self::new(code, format!("[{}] {}", e.code(), e))
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_by_severity() {
        let boot: CliError = StoreError::Initialization("empty root".into()).into();
        assert_eq!(boot.code(), &CliErrorCode::BootFailed);

        let request: CliError = StoreError::invalid_filter("match[foo]").into();
        assert_eq!(request.code_str(), "TAXII_CLI_REQUEST_FAILED");
        assert!(request.message().contains("TAXII_INVALID_FILTER"));

        let config: CliError = StoreError::Config("bad".into()).into();
        assert_eq!(config.code(), &CliErrorCode::ConfigError);
    }
}
