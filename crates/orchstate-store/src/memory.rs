//! In-memory driver implementation.
//!
//! Collections live in a process-local map guarded by a read-write lock. Each
//! operation takes the lock once, so every single write is atomic.

use std::collections::HashMap;

use async_trait::async_trait;
use orchstate_core::RawDocument;
use parking_lot::RwLock;

use crate::error::Result;
use crate::query::{Cursor, Filter, FindOptions};
use crate::schema::{check_unique, IndexSpec};
use crate::Driver;

#[derive(Debug, Default)]
struct Collection {
    documents: Vec<RawDocument>,
    indexes: Vec<IndexSpec>,
}

/// In-memory storage implementation.
#[derive(Debug, Default)]
pub struct MemoryDriver {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryDriver {
    /// Create an empty driver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the collections holding at least one document or index.
    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn create_index(&self, collection: &str, index: IndexSpec) -> Result<()> {
        let mut collections = self.collections.write();
        let coll = collections.entry(collection.to_string()).or_default();
        if coll.indexes.contains(&index) {
            return Ok(());
        }

        if index.unique {
            let single = [index.clone()];
            for (i, doc) in coll.documents.iter().enumerate() {
                check_unique(collection, &single, doc, &coll.documents[..i])?;
            }
        }

        tracing::debug!(collection, index = %index.name, unique = index.unique, "Registered index");
        coll.indexes.push(index);
        Ok(())
    }

    async fn insert_one(&self, collection: &str, document: RawDocument) -> Result<()> {
        let mut collections = self.collections.write();
        let coll = collections.entry(collection.to_string()).or_default();
        check_unique(collection, &coll.indexes, &document, &coll.documents)?;
        coll.documents.push(document);
        tracing::debug!(collection, "Inserted document");
        Ok(())
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: FindOptions,
    ) -> Result<Cursor> {
        let collections = self.collections.read();
        let matched: Vec<RawDocument> = collections
            .get(collection)
            .map(|coll| {
                coll.documents
                    .iter()
                    .filter(|d| filter.matches(d))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(Cursor::new(options.apply(matched)))
    }

    async fn update(
        &self,
        collection: &str,
        filter: &Filter,
        changes: RawDocument,
    ) -> Result<u64> {
        let mut collections = self.collections.write();
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(0);
        };

        // Validate every updated document before touching any of them.
        let mut updated = Vec::new();
        for (i, doc) in coll.documents.iter().enumerate() {
            if !filter.matches(doc) {
                continue;
            }
            let mut next = doc.clone();
            next.extend(changes.clone());
            let others = coll
                .documents
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, d)| d);
            check_unique(collection, &coll.indexes, &next, others)?;
            updated.push((i, next));
        }

        let count = updated.len() as u64;
        for (i, next) in updated {
            coll.documents[i] = next;
        }
        tracing::debug!(collection, count, "Updated documents");
        Ok(count)
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let mut collections = self.collections.write();
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = coll.documents.len();
        coll.documents.retain(|d| !filter.matches(d));
        let count = (before - coll.documents.len()) as u64;
        tracing::debug!(collection, count, "Deleted documents");
        Ok(count)
    }
}
