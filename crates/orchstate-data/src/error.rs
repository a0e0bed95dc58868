//! Error types for the document mapper.
//!
//! Absence is never an error here: lookups return `Option` or an empty list.

use orchstate_core::IdError;
use orchstate_store::StoreError;
use thiserror::Error;

/// A result type using `DataError`.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur while mapping or persisting documents.
#[derive(Debug, Error)]
pub enum DataError {
    /// A field value is missing, null where forbidden, or of the wrong type.
    #[error("invalid value for field {field}: {reason}")]
    Validation {
        /// The offending field.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A field name that the entity does not declare.
    #[error("unknown field: {field}")]
    UnknownField {
        /// The undeclared field name.
        field: String,
    },

    /// The store rejected a write because a unique index would be violated.
    #[error("unique constraint violated in {collection}: index {index}")]
    UniqueConstraintViolation {
        /// Collection the write targeted.
        collection: String,
        /// Name of the violated index.
        index: String,
    },

    /// A stored document no longer matches the declared schema.
    #[error("corrupt record in {collection}, field {field}: {reason}")]
    CorruptRecord {
        /// Collection the document was read from.
        collection: String,
        /// The field that failed to decode.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A composite resource identifier could not be parsed.
    #[error("invalid resource identifier: {0}")]
    InvalidResourceId(#[from] IdError),

    /// Storage layer error.
    #[error("storage error: {0}")]
    Store(StoreError),
}

impl DataError {
    pub(crate) fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt(
        collection: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::CorruptRecord {
            collection: collection.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for `Validation` and `UnknownField`, the construction-time errors.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::UnknownField { .. })
    }
}

impl From<StoreError> for DataError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey { collection, index } => {
                Self::UniqueConstraintViolation { collection, index }
            }
            other => Self::Store(other),
        }
    }
}
