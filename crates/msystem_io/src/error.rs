//! Error types for msystem_io crate.
//!
//! Provides structured error handling for descriptor loading and run logs.

use thiserror::Error;

/// Main error type for msystem_io operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File system errors
    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Descriptor or model validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    Context {
        context: String,
        source: Box<IoError>,
    },
}

/// Result type alias for msystem_io operations.
pub type Result<T> = std::result::Result<T, IoError>;

impl IoError {
    /// Creates a new serialization error.
    #[must_use]
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        Self::Serialization(msg.into())
    }

    /// Creates a new validation error.
    #[must_use]
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Wraps an error with additional context.
    #[must_use]
    pub fn with_context<S: Into<String>>(self, context: S) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

impl From<msystem_core::ValidationError> for IoError {
    fn from(err: msystem_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IoError::serialization("bad bytes");
        assert_eq!(err.to_string(), "Serialization error: bad bytes");
    }

    #[test]
    fn test_error_context() {
        let err = IoError::validation("tile `q1` has no vertices").with_context("loading model");
        assert!(err.to_string().starts_with("loading model"));
        assert!(err.to_string().contains("q1"));
    }

    #[test]
    fn test_from_validation_error() {
        let err: IoError = msystem_core::ValidationError::new("g", "undeclared glue").into();
        assert!(matches!(err, IoError::Validation(_)));
    }
}
