// ABOUTME: Unified error handling for the conversation cache and quota subsystem
// ABOUTME: Defines error codes, the AppError type, and HTTP status mapping for callers
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Standard error codes surfaced by this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Malformed `user_id` or `conversation_id`; rejected before any backend I/O
    #[serde(rename = "INVALID_IDENTIFIER")]
    InvalidIdentifier,
    /// Subject has no remaining token budget
    #[serde(rename = "QUOTA_EXCEEDED")]
    QuotaExceeded,
    /// Backend failure (connectivity, constraint violation, malformed payload)
    #[serde(rename = "STORAGE_ERROR")]
    StorageError,
    /// Invalid configuration input
    #[serde(rename = "CONFIG_ERROR")]
    ConfigError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidIdentifier => 400,
            Self::QuotaExceeded => 429,
            Self::StorageError | Self::ConfigError => 500,
        }
    }

    /// Get a user-friendly description of this error
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier => "The provided identifier is not a valid UUID",
            Self::QuotaExceeded => "Token quota exceeded for this subject",
            Self::StorageError => "Storage operation failed",
            Self::ConfigError => "Configuration error encountered",
        }
    }
}

/// Unified error type for the crate
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message naming the failing operation
    pub message: String,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new `AppError` with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Add a source error for error chaining
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    /// Malformed user or conversation identifier
    pub fn invalid_identifier(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidIdentifier, message)
    }

    /// Insufficient remaining token budget
    pub fn quota_exceeded(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::QuotaExceeded, message)
    }

    /// Backend failure wrapping the underlying cause; `operation` names the
    /// method that failed so the caller sees where the sequence broke
    pub fn storage(
        operation: &str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::new(ErrorCode::StorageError, format!("{operation} failed")).with_source(source)
    }

    /// Backend failure without a typed cause
    pub fn storage_message(operation: &str, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::StorageError,
            format!("{operation} failed: {}", message.into()),
        )
    }

    /// Configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_http_status() {
        assert_eq!(ErrorCode::InvalidIdentifier.http_status(), 400);
        assert_eq!(ErrorCode::QuotaExceeded.http_status(), 429);
        assert_eq!(ErrorCode::StorageError.http_status(), 500);
    }

    #[test]
    fn test_storage_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let error = AppError::storage("ConversationCache.get", io);

        assert_eq!(error.code, ErrorCode::StorageError);
        assert!(error.message.contains("ConversationCache.get"));
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::QuotaExceeded).unwrap();
        assert_eq!(json, "\"QUOTA_EXCEEDED\"");
    }
}
