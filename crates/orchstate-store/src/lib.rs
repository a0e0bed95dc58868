//! Document store driver for orchstate.
//!
//! This crate provides the schemaless document store the mapper persists into.
//! Documents are [`RawDocument`] maps keyed by collection; every document carries
//! its primary key under [`schema::ID_FIELD`].
//!
//! # Architecture
//!
//! Two drivers implement the [`Driver`] trait:
//!
//! - [`MemoryDriver`]: in-process collections, used by tests and tooling
//! - [`RocksDriver`]: one `RocksDB` column family per collection, documents
//!   encoded as CBOR, registered indexes kept in the `__indexes` column family
//!
//! Both enforce the unique indexes registered through [`Driver::create_index`]
//! and signal violations as [`StoreError::DuplicateKey`]. Each single write is
//! atomic; there are no multi-document transactions.
//!
//! # Example
//!
//! ```
//! use orchstate_core::{RawDocument, Value};
//! use orchstate_store::{Driver, Filter, FindOptions, MemoryDriver};
//!
//! # async fn example() -> orchstate_store::Result<()> {
//! let driver = MemoryDriver::new();
//! let mut doc = RawDocument::new();
//! doc.insert("_id".into(), Value::Int(1));
//! doc.insert("name".into(), Value::from("test"));
//! driver.insert_one("Project", doc).await?;
//!
//! let found = driver
//!     .find("Project", &Filter::new().eq("name", "test"), FindOptions::default())
//!     .await?
//!     .to_list(10);
//! assert_eq!(found.len(), 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
pub mod query;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryDriver;
pub use query::{Condition, Cursor, Filter, FindOptions, Op, SortOrder};
pub use rocks::RocksDriver;
pub use schema::{IndexSpec, ID_FIELD};

use async_trait::async_trait;
use orchstate_core::RawDocument;

/// The storage trait defining the primitives the mapper builds on.
///
/// This trait abstracts the document store, allowing for different implementations
/// (e.g., `RocksDB`, in-memory for testing).
#[async_trait]
pub trait Driver: Send + Sync {
    /// Register an index on a collection. Registering the same index twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateKey` if a unique index is declared over
    /// documents that already collide.
    async fn create_index(&self, collection: &str, index: IndexSpec) -> Result<()>;

    /// Insert a new document.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateKey` if the `_id` or a unique index collides.
    async fn insert_one(&self, collection: &str, document: RawDocument) -> Result<()>;

    /// Find all documents matching `filter`, sorted and paged per `options`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find(&self, collection: &str, filter: &Filter, options: FindOptions)
        -> Result<Cursor>;

    /// Find the first document matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<RawDocument>> {
        let mut cursor = self
            .find(collection, filter, FindOptions::default().limit(1))
            .await?;
        Ok(cursor.next())
    }

    /// Set `changes` on every document matching `filter`, returning the number updated.
    ///
    /// Fields not named in `changes` are left untouched.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateKey` if an updated document would collide
    /// on a unique index.
    async fn update(&self, collection: &str, filter: &Filter, changes: RawDocument)
        -> Result<u64>;

    /// Delete every document matching `filter`, returning the number deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64>;

    /// Count the documents matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let cursor = self.find(collection, filter, FindOptions::default()).await?;
        Ok(cursor.remaining() as u64)
    }
}
