//! Error types for the store driver.

use thiserror::Error;

/// A result type using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write would violate a unique index.
    #[error("duplicate key in collection {collection}: index {index}")]
    DuplicateKey {
        /// Collection the write targeted.
        collection: String,
        /// Name of the violated index.
        index: String,
    },

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Returns true if this error signals a unique index violation.
    #[must_use]
    pub const fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }
}
