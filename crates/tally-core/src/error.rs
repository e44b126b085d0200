//! Error types and result aliases for Tally.
//!
//! This module defines the shared error types used across all Tally components.
//! Errors are structured for programmatic handling and include context for debugging.

/// The result type used throughout Tally.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Tally core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An invalid identifier was provided.
    #[error("invalid identifier: {message}")]
    InvalidId {
        /// Description of what made the ID invalid.
        message: String,
    },

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new invalid-identifier error.
    #[must_use]
    pub fn invalid_id(message: impl Into<String>) -> Self {
        Self::InvalidId {
            message: message.into(),
        }
    }
}
