//! Memory Error Types
//!
//! Defines the error taxonomy shared by the store, the similarity indexes,
//! the embedding providers and the consolidation controller.

use thiserror::Error;

/// Memory Result type alias
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Memory errors
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigValidationError),

    /// Embedding provider failed or produced an unusable vector
    #[error("embedding error: {message}")]
    Embedding { message: String },

    /// Vector length does not match the index dimension
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Record not found
    #[error("memory not found: {id}")]
    NotFound { id: String },

    /// Cognition collaborator failed
    #[error("cognition error: {message}")]
    Cognition { message: String },

    /// Caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,

    /// Timeout error
    #[error("operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MemoryError {
    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create a cognition error
    pub fn cognition(message: impl Into<String>) -> Self {
        Self::Cognition {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create a dimension mismatch error
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Create a timeout error
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Check if this error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if this error came from a cancelled operation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
