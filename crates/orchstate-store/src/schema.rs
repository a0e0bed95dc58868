//! Collection and index definitions shared by the drivers.

use orchstate_core::{RawDocument, Value};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Primary-key field of every stored document.
pub const ID_FIELD: &str = "_id";

/// Name of the implicit unique index on [`ID_FIELD`].
pub const ID_INDEX: &str = "_id_";

/// Column family names reserved by the `RocksDB` driver.
pub mod cf {
    /// Registered index specifications, keyed by collection name.
    pub const INDEXES: &str = "__indexes";

    /// The `RocksDB` default column family; never used for documents.
    pub const DEFAULT: &str = "default";
}

/// An index declared on a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index name, reported on violations.
    pub name: String,
    /// Indexed fields in key order.
    pub fields: Vec<String>,
    /// Whether two documents may share the same key.
    pub unique: bool,
}

impl IndexSpec {
    /// Create a non-unique index over `fields`; the name is derived from them.
    #[must_use]
    pub fn new<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        Self {
            name: fields.join("_"),
            fields,
            unique: false,
        }
    }

    /// Mark the index unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Extract this index's key from a document. Missing fields index as `Null`.
    #[must_use]
    pub fn key<'a>(&self, document: &'a RawDocument) -> Vec<&'a Value> {
        self.fields
            .iter()
            .map(|f| document.get(f).unwrap_or(&Value::Null))
            .collect()
    }
}

/// Verify that `candidate` collides with none of `others` on `_id` or any unique index.
///
/// `others` must not contain the stored version of `candidate` itself.
///
/// # Errors
///
/// Returns `StoreError::DuplicateKey` naming the first violated index.
pub fn check_unique<'a>(
    collection: &str,
    indexes: &[IndexSpec],
    candidate: &RawDocument,
    others: impl IntoIterator<Item = &'a RawDocument>,
) -> Result<()> {
    let id = candidate.get(ID_FIELD);
    let unique: Vec<_> = indexes.iter().filter(|i| i.unique).collect();

    for other in others {
        if id.is_some() && other.get(ID_FIELD) == id {
            return Err(duplicate(collection, ID_INDEX));
        }
        if let Some(index) = unique.iter().find(|i| i.key(candidate) == i.key(other)) {
            return Err(duplicate(collection, &index.name));
        }
    }
    Ok(())
}

fn duplicate(collection: &str, index: &str) -> StoreError {
    StoreError::DuplicateKey {
        collection: collection.to_string(),
        index: index.to_string(),
    }
}
