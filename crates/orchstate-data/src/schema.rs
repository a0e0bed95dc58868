//! Entity schemas: the static table of fields, indexes and cascades per entity.

use std::fmt;

use orchstate_core::RawDocument;
use orchstate_store::{Filter, IndexSpec};

use crate::field::Field;

/// An index declared by an entity.
#[derive(Debug, Clone, Copy)]
pub struct Index {
    /// Indexed fields in key order.
    pub fields: &'static [&'static str],
    /// Whether the index rejects duplicates.
    pub unique: bool,
}

impl Index {
    /// Convert to the driver's index specification.
    #[must_use]
    pub fn spec(&self) -> IndexSpec {
        let spec = IndexSpec::new(self.fields.iter().copied());
        if self.unique {
            spec.unique()
        } else {
            spec
        }
    }
}

/// A parent-to-child ownership link followed by cascading deletes.
#[derive(Clone, Copy)]
pub struct Cascade {
    /// Schema of the owned entity.
    pub child: &'static Schema,
    /// Builds the filter selecting the children of a stored parent document.
    pub scope: fn(&RawDocument) -> Filter,
}

impl fmt::Debug for Cascade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cascade")
            .field("child", &self.child.collection)
            .finish_non_exhaustive()
    }
}

/// The declared shape of an entity.
#[derive(Debug)]
pub struct Schema {
    /// Collection the entity is stored in.
    pub collection: &'static str,
    /// Declared fields.
    pub fields: &'static [Field],
    /// Declared indexes.
    pub indexes: &'static [Index],
    /// Owned entities, deleted before the parent in this order.
    pub children: &'static [Cascade],
}

impl Schema {
    /// Look up a declared field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&'static Field> {
        // Re-borrow through the 'static slice so the result outlives `self`.
        let fields: &'static [Field] = self.fields;
        fields.iter().find(|f| f.name == name)
    }

    /// Index specifications for the driver.
    #[must_use]
    pub fn index_specs(&self) -> Vec<IndexSpec> {
        self.indexes.iter().map(Index::spec).collect()
    }
}

/// A persisted entity kind.
///
/// Implementors are marker types; the data lives in
/// [`Document<E>`](crate::document::Document).
pub trait Entity: Send + Sync + 'static {
    /// The static schema of this entity.
    fn schema() -> &'static Schema;
}
