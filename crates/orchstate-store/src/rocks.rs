//! `RocksDB` driver implementation.
//!
//! Every collection maps to a column family created on first write. Documents are
//! keyed by the CBOR encoding of their `_id` and stored as CBOR. Index
//! specifications are persisted in the `__indexes` column family so they survive
//! a reopen. Writes are serialized through a single lock so the uniqueness check
//! and the write it guards are atomic; all database work runs on the blocking
//! thread pool.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use orchstate_core::RawDocument;
use parking_lot::{Mutex, RwLock};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use crate::error::{Result, StoreError};
use crate::query::{Cursor, Filter, FindOptions};
use crate::schema::{cf, check_unique, IndexSpec, ID_FIELD};
use crate::Driver;

type Db = DBWithThreadMode<MultiThreaded>;

/// RocksDB-backed driver implementation.
pub struct RocksDriver {
    inner: Arc<Inner>,
}

struct Inner {
    db: Db,
    indexes: RwLock<HashMap<String, Vec<IndexSpec>>>,
    write_lock: Mutex<()>,
}

impl RocksDriver {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created, or if the
    /// persisted index registry cannot be decoded.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        // An absent database has no column families to list yet.
        let mut names = Db::list_cf(&opts, path.as_ref()).unwrap_or_default();
        for required in [cf::DEFAULT, cf::INDEXES] {
            if !names.iter().any(|n| n == required) {
                names.push(required.to_string());
            }
        }

        let cf_descriptors: Vec<_> = names
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = Db::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let inner = Inner {
            db,
            indexes: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
        };
        inner.load_indexes()?;
        tracing::debug!(collections = names.len(), "Opened RocksDB driver");

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Run `f` against the database on the blocking thread pool.
    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Inner) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|e| StoreError::Database(format!("blocking task failed: {e}")))?
    }
}

impl Inner {
    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn document_key(document: &RawDocument) -> Result<Vec<u8>> {
        let id = document
            .get(ID_FIELD)
            .ok_or_else(|| StoreError::Database(format!("document has no {ID_FIELD} field")))?;
        Self::serialize(id)
    }

    fn load_indexes(&self) -> Result<()> {
        let handle = self.existing_cf(cf::INDEXES).ok_or_else(|| {
            StoreError::Database(format!("column family not found: {}", cf::INDEXES))
        })?;

        let mut indexes = self.indexes.write();
        for item in self.db.iterator_cf(&handle, IteratorMode::Start) {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let collection = String::from_utf8(key.to_vec())
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            indexes.insert(collection, Self::deserialize(&value)?);
        }
        Ok(())
    }

    fn existing_cf(&self, name: &str) -> Option<Arc<BoundColumnFamily<'_>>> {
        self.db.cf_handle(name)
    }

    /// Get a column family handle, creating it on first use. Callers hold the write lock.
    fn cf_or_create(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        if name == cf::INDEXES || name == cf::DEFAULT {
            return Err(StoreError::Database(format!("reserved collection name: {name}")));
        }
        if self.db.cf_handle(name).is_none() {
            self.db
                .create_cf(name, &Options::default())
                .map_err(|e| StoreError::Database(e.to_string()))?;
            tracing::debug!(collection = name, "Created column family");
        }
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Read every document of a collection together with its key.
    fn scan(&self, collection: &str) -> Result<Vec<(Vec<u8>, RawDocument)>> {
        let Some(handle) = self.existing_cf(collection) else {
            return Ok(Vec::new());
        };

        let mut documents = Vec::new();
        for item in self.db.iterator_cf(&handle, IteratorMode::Start) {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            documents.push((key.to_vec(), Self::deserialize(&value)?));
        }
        Ok(documents)
    }

    fn indexes_for(&self, collection: &str) -> Vec<IndexSpec> {
        self.indexes
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn create_index(&self, collection: &str, index: IndexSpec) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut specs = self.indexes_for(collection);
        if specs.contains(&index) {
            return Ok(());
        }

        if index.unique {
            let documents: Vec<_> = self.scan(collection)?.into_iter().map(|(_, d)| d).collect();
            let single = [index.clone()];
            for (i, doc) in documents.iter().enumerate() {
                check_unique(collection, &single, doc, &documents[..i])?;
            }
        }

        let handle = self.existing_cf(cf::INDEXES).ok_or_else(|| {
            StoreError::Database(format!("column family not found: {}", cf::INDEXES))
        })?;
        tracing::debug!(collection, index = %index.name, unique = index.unique, "Registered index");
        specs.push(index);
        self.db
            .put_cf(&handle, collection.as_bytes(), Self::serialize(&specs)?)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        self.indexes.write().insert(collection.to_string(), specs);
        Ok(())
    }

    fn insert_one(&self, collection: &str, document: &RawDocument) -> Result<()> {
        let _guard = self.write_lock.lock();
        let handle = self.cf_or_create(collection)?;
        let key = Self::document_key(document)?;
        let value = Self::serialize(document)?;

        let existing = self.scan(collection)?;
        let indexes = self.indexes_for(collection);
        check_unique(collection, &indexes, document, existing.iter().map(|(_, d)| d))?;

        self.db
            .put_cf(&handle, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        tracing::debug!(collection, "Inserted document");
        Ok(())
    }

    fn find(&self, collection: &str, filter: &Filter, options: &FindOptions) -> Result<Cursor> {
        let matched: Vec<_> = self
            .scan(collection)?
            .into_iter()
            .map(|(_, d)| d)
            .filter(|d| filter.matches(d))
            .collect();
        Ok(Cursor::new(options.apply(matched)))
    }

    fn update(&self, collection: &str, filter: &Filter, changes: &RawDocument) -> Result<u64> {
        let _guard = self.write_lock.lock();
        let Some(handle) = self.existing_cf(collection) else {
            return Ok(0);
        };

        let existing = self.scan(collection)?;
        let indexes = self.indexes_for(collection);

        let mut batch = WriteBatch::default();
        let mut count = 0u64;
        for (i, (key, doc)) in existing.iter().enumerate() {
            if !filter.matches(doc) {
                continue;
            }
            let mut next = doc.clone();
            next.extend(changes.clone());
            let others = existing
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, (_, d))| d);
            check_unique(collection, &indexes, &next, others)?;

            // A changed _id moves the document to a new key.
            let next_key = Self::document_key(&next)?;
            if &next_key != key {
                batch.delete_cf(&handle, key);
            }
            batch.put_cf(&handle, &next_key, Self::serialize(&next)?);
            count += 1;
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        tracing::debug!(collection, count, "Updated documents");
        Ok(count)
    }

    fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let _guard = self.write_lock.lock();
        let Some(handle) = self.existing_cf(collection) else {
            return Ok(0);
        };

        let mut batch = WriteBatch::default();
        let mut count = 0u64;
        for (key, doc) in self.scan(collection)? {
            if filter.matches(&doc) {
                batch.delete_cf(&handle, key);
                count += 1;
            }
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        tracing::debug!(collection, count, "Deleted documents");
        Ok(count)
    }
}

#[async_trait]
impl Driver for RocksDriver {
    async fn create_index(&self, collection: &str, index: IndexSpec) -> Result<()> {
        let collection = collection.to_string();
        self.run(move |inner| inner.create_index(&collection, index))
            .await
    }

    async fn insert_one(&self, collection: &str, document: RawDocument) -> Result<()> {
        let collection = collection.to_string();
        self.run(move |inner| inner.insert_one(&collection, &document))
            .await
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: FindOptions,
    ) -> Result<Cursor> {
        let collection = collection.to_string();
        let filter = filter.clone();
        self.run(move |inner| inner.find(&collection, &filter, &options))
            .await
    }

    async fn update(
        &self,
        collection: &str,
        filter: &Filter,
        changes: RawDocument,
    ) -> Result<u64> {
        let collection = collection.to_string();
        let filter = filter.clone();
        self.run(move |inner| inner.update(&collection, &filter, &changes))
            .await
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let collection = collection.to_string();
        let filter = filter.clone();
        self.run(move |inner| inner.delete_many(&collection, &filter))
            .await
    }
}
