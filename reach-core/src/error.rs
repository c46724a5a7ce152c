//! Error types for REACH.
//!
//! One taxonomy for the whole service: validation failures are the only
//! variants whose message may reach a caller; storage and serialization
//! failures are reported generically at the HTTP edge.

use thiserror::Error;

/// Result type alias using `ReachError`.
pub type Result<T> = std::result::Result<T, ReachError>;

/// Main error type for all REACH operations.
#[derive(Debug, Error)]
pub enum ReachError {
    // ═══════════════════════════════════════════════════════════════════════════
    // REQUEST ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Missing or blank mandatory dimension, or malformed pagination.
    #[error("Validation error: {0}")]
    Validation(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // RULE STORE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Rule store unreachable or query failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Rule store call exceeded its time budget.
    #[error("Storage call timed out after {millis}ms")]
    StorageTimeout {
        /// Budget that was exceeded, in milliseconds
        millis: u64,
    },

    /// A campaign or rule record failed validation on write.
    #[error("Invalid rule data: {0}")]
    InvalidRule(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ═══════════════════════════════════════════════════════════════════════════
    // ENVIRONMENT ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal invariant violation (should never happen).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReachError {
    /// Returns true if this error is caused by the caller's request.
    pub fn is_validation_error(&self) -> bool {
        matches!(self, ReachError::Validation(_))
    }

    /// Returns true if this error originated in the rule store.
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            ReachError::Storage(_) | ReachError::StorageTimeout { .. }
        )
    }

    /// Message safe to show to an HTTP caller.
    ///
    /// Validation messages are returned verbatim; everything else collapses
    /// to the generic internal error text.
    pub fn public_message(&self) -> String {
        match self {
            ReachError::Validation(msg) => msg.clone(),
            _ => crate::constants::ERR_INTERNAL.to_string(),
        }
    }
}
