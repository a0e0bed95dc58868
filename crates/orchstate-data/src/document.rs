//! The generic document mapper.
//!
//! A [`Document<E>`] holds the field values of one entity instance together
//! with its identifier. Construction validates against the entity's
//! [`Schema`]; persistence converts to and from the store's representation
//! (identifier under `_id`, enumerations by name, map keys escaped) and
//! delegates to a [`Driver`].

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use orchstate_core::{RawDocument, Value};
use orchstate_store::{Driver, Filter, FindOptions, ID_FIELD};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DataError, Result};
use crate::escape::{escape_value, unescape_value};
use crate::field::{Field, FieldType, StoredEnum};
use crate::schema::{Entity, Schema};

/// Name of the identifier in the caller-facing view of a document.
pub const ID: &str = "id";

/// Where the values passed to [`Document::build`] come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Supplied by application code. An `id` may be given.
    Caller,
    /// Read back from the store. The identifier is attached separately and
    /// may not appear among the fields.
    Store,
}

/// A typed instance of entity `E`.
pub struct Document<E: Entity> {
    id: Option<Uuid>,
    values: BTreeMap<&'static str, Value>,
    entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for Document<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            values: self.values.clone(),
            entity: PhantomData,
        }
    }
}

impl<E: Entity> fmt::Debug for Document<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(E::schema().collection)
            .field("id", &self.id)
            .field("values", &self.values)
            .finish()
    }
}

impl<E: Entity> Document<E> {
    /// Construct a new document from caller-supplied fields.
    ///
    /// # Errors
    ///
    /// See [`Document::build`].
    pub fn new<I, K, V>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        Self::build(fields, Origin::Caller)
    }

    /// Construct a document, validating every field against the schema.
    ///
    /// Omitted optional fields receive a freshly built default.
    ///
    /// # Errors
    ///
    /// - `DataError::UnknownField` for a name the entity does not declare
    /// - `DataError::Validation` for a wrong-typed value, a null or missing
    ///   required field, or an `id` supplied with [`Origin::Store`]
    pub fn build<I, K, V>(fields: I, origin: Origin) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let schema = E::schema();
        let mut id = None;
        let mut values = BTreeMap::new();

        for (name, value) in fields {
            let name = name.as_ref();
            let value = value.into();
            if name == ID {
                if origin == Origin::Store {
                    return Err(DataError::validation(
                        ID,
                        "identifier of a stored document cannot be supplied",
                    ));
                }
                id = Some(parse_id(&value)?);
                continue;
            }
            let field = schema.field(name).ok_or_else(|| DataError::UnknownField {
                field: name.to_string(),
            })?;
            field.validate(&value)?;
            values.insert(field.name, value);
        }

        for field in schema.fields {
            if values.contains_key(field.name) {
                continue;
            }
            if field.required {
                return Err(DataError::validation(field.name, "required field missing"));
            }
            values.insert(field.name, field.default_value());
        }

        Ok(Self {
            id,
            values,
            entity: PhantomData,
        })
    }

    /// Name of the collection documents of `E` are stored in.
    #[must_use]
    pub fn collection_name() -> &'static str {
        E::schema().collection
    }

    /// The identifier, if one has been assigned.
    #[must_use]
    pub const fn id(&self) -> Option<Uuid> {
        self.id
    }

    /// Assign the identifier. It can be set exactly once.
    ///
    /// # Errors
    ///
    /// Returns `DataError::Validation` if an identifier is already set.
    pub fn set_id(&mut self, id: Uuid) -> Result<()> {
        if self.id.is_some() {
            return Err(DataError::validation(ID, "identifier is already set"));
        }
        self.id = Some(id);
        Ok(())
    }

    fn ensure_id(&mut self) -> Uuid {
        *self.id.get_or_insert_with(Uuid::new_v4)
    }

    fn stored_id(&self) -> Result<Uuid> {
        self.id
            .ok_or_else(|| DataError::validation(ID, "document has not been inserted"))
    }

    /// The value of a declared field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Replace the value of a declared field in memory.
    ///
    /// # Errors
    ///
    /// Returns `DataError::UnknownField` or `DataError::Validation` as for
    /// construction; `id` can only be changed through [`Document::set_id`].
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if name == ID {
            return self.set_id(parse_id(&value)?);
        }
        let field = Self::declared(name)?;
        field.validate(&value)?;
        self.values.insert(field.name, value);
        Ok(())
    }

    /// Mutable access to a list field.
    ///
    /// # Errors
    ///
    /// Returns `DataError::UnknownField` for an undeclared name, or
    /// `DataError::Validation` if the field is not a list.
    pub fn list_mut(&mut self, name: &str) -> Result<&mut Vec<Value>> {
        let field = Self::declared(name)?;
        let slot = self.values.entry(field.name).or_insert_with(Value::empty_list);
        if slot.is_null() && !field.required {
            *slot = Value::empty_list();
        }
        slot.as_list_mut()
            .ok_or_else(|| DataError::validation(field.name, "field is not a list"))
    }

    /// Mutable access to a map field.
    ///
    /// # Errors
    ///
    /// Returns `DataError::UnknownField` for an undeclared name, or
    /// `DataError::Validation` if the field is not a map.
    pub fn map_mut(&mut self, name: &str) -> Result<&mut BTreeMap<String, Value>> {
        let field = Self::declared(name)?;
        let slot = self.values.entry(field.name).or_insert_with(Value::empty_map);
        if slot.is_null() && !field.required {
            *slot = Value::empty_map();
        }
        slot.as_map_mut()
            .ok_or_else(|| DataError::validation(field.name, "field is not a map"))
    }

    fn declared(name: &str) -> Result<&'static Field> {
        E::schema().field(name).ok_or_else(|| DataError::UnknownField {
            field: name.to_string(),
        })
    }

    /// A string field.
    #[must_use]
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// A boolean field.
    #[must_use]
    pub fn bool_field(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// An integer field.
    #[must_use]
    pub fn int_field(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    /// A uuid field.
    #[must_use]
    pub fn uuid_field(&self, name: &str) -> Option<Uuid> {
        self.get(name).and_then(Value::as_uuid)
    }

    /// A timestamp field.
    #[must_use]
    pub fn datetime_field(&self, name: &str) -> Option<DateTime<Utc>> {
        self.get(name).and_then(Value::as_datetime)
    }

    /// A list field.
    #[must_use]
    pub fn list_field(&self, name: &str) -> Option<&Vec<Value>> {
        self.get(name).and_then(Value::as_list)
    }

    /// A map field.
    #[must_use]
    pub fn map_field(&self, name: &str) -> Option<&BTreeMap<String, Value>> {
        self.get(name).and_then(Value::as_map)
    }

    /// An enumeration field.
    #[must_use]
    pub fn enum_field<T: StoredEnum>(&self, name: &str) -> Option<T> {
        self.get(name).and_then(T::from_value)
    }

    /// The caller-facing mapping: every field plus `id` (null if unassigned).
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        let mut map: BTreeMap<String, Value> = self
            .values
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect();
        map.insert(ID.to_string(), self.id.map_or(Value::Null, Value::Uuid));
        map
    }

    /// The mapping persisted in the store.
    ///
    /// The identifier is stored under `_id` (omitted if unassigned),
    /// enumerations by name, and every nested map key is escaped.
    #[must_use]
    pub fn to_storage(&self) -> RawDocument {
        let mut raw: RawDocument = self
            .values
            .iter()
            .map(|(k, v)| ((*k).to_string(), to_stored(v.clone())))
            .collect();
        if let Some(id) = self.id {
            raw.insert(ID_FIELD.to_string(), Value::Uuid(id));
        }
        raw
    }

    /// Rebuild a typed document from its stored mapping.
    ///
    /// # Errors
    ///
    /// Returns `DataError::CorruptRecord` if the identifier is missing, a field
    /// is undeclared, an enumeration name is unknown, or a value no longer
    /// matches its declared type.
    pub fn from_storage(mut raw: RawDocument) -> Result<Self> {
        let collection = Self::collection_name();
        let id = match raw.remove(ID_FIELD) {
            Some(Value::Uuid(id)) => id,
            Some(other) => {
                return Err(DataError::corrupt(
                    collection,
                    ID_FIELD,
                    format!("expected uuid, got {}", other.kind()),
                ))
            }
            None => return Err(DataError::corrupt(collection, ID_FIELD, "missing identifier")),
        };

        let mut fields = Vec::with_capacity(raw.len());
        for (name, stored) in raw {
            let field = E::schema()
                .field(&name)
                .ok_or_else(|| DataError::corrupt(collection, &name, "field is not declared"))?;
            fields.push((field.name, from_stored(collection, field, stored)?));
        }

        let mut document = Self::build(fields, Origin::Store).map_err(|err| match err {
            DataError::Validation { field, reason } => DataError::corrupt(collection, field, reason),
            other => other,
        })?;
        document.id = Some(id);
        Ok(document)
    }

    /// Insert this document, assigning an identifier first if it has none.
    ///
    /// # Errors
    ///
    /// Returns `DataError::UniqueConstraintViolation` if a unique index (or the
    /// identifier) collides.
    pub async fn insert(&mut self, driver: &dyn Driver) -> Result<()> {
        let id = self.ensure_id();
        let collection = Self::collection_name();
        driver.insert_one(collection, self.to_storage()).await?;
        debug!(collection, %id, "Inserted document");
        Ok(())
    }

    /// Change the named fields, in memory and in the store.
    ///
    /// Only the given fields are validated and written.
    ///
    /// # Errors
    ///
    /// Returns `DataError::Validation` if the document has not been inserted
    /// or a value is invalid, `DataError::UnknownField` for undeclared names.
    pub async fn update<I, K, V>(&mut self, driver: &dyn Driver, changes: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let id = self.stored_id()?;
        let mut validated = Vec::new();
        for (name, value) in changes {
            let name = name.as_ref();
            if name == ID {
                return Err(DataError::validation(ID, "identifier cannot be changed"));
            }
            let field = Self::declared(name)?;
            let value = value.into();
            field.validate(&value)?;
            validated.push((field.name, value));
        }

        let stored: RawDocument = validated
            .iter()
            .map(|(name, value)| ((*name).to_string(), to_stored(value.clone())))
            .collect();
        let collection = Self::collection_name();
        let updated = driver.update(collection, &id_filter(id), stored).await?;
        debug!(collection, %id, fields = validated.len(), updated, "Updated document");

        self.values.extend(validated);
        Ok(())
    }

    /// Write the whole current state of an inserted document.
    ///
    /// # Errors
    ///
    /// Returns `DataError::Validation` if the document has not been inserted.
    pub async fn save(&self, driver: &dyn Driver) -> Result<()> {
        let id = self.stored_id()?;
        let collection = Self::collection_name();
        let updated = driver
            .update(collection, &id_filter(id), self.to_storage())
            .await?;
        debug!(collection, %id, updated, "Saved document");
        Ok(())
    }

    /// Fetch a document by identifier. Absence is `None`.
    ///
    /// # Errors
    ///
    /// Returns `DataError::CorruptRecord` if the stored document cannot be read.
    pub async fn get_by_id(driver: &dyn Driver, id: Uuid) -> Result<Option<Self>> {
        driver
            .find_one(Self::collection_name(), &id_filter(id))
            .await?
            .map(Self::from_storage)
            .transpose()
    }

    /// All documents matching `filter`.
    ///
    /// Conditions may name `id` and may hold typed values such as enumeration
    /// members; both are converted to their stored form.
    ///
    /// # Errors
    ///
    /// Returns `DataError::CorruptRecord` if a stored document cannot be read.
    pub async fn get_list(driver: &dyn Driver, filter: Filter) -> Result<Vec<Self>> {
        Self::find(driver, filter, FindOptions::default()).await
    }

    /// Documents matching `filter`, sorted and paged per `options`.
    ///
    /// # Errors
    ///
    /// Returns `DataError::CorruptRecord` if a stored document cannot be read.
    pub async fn find(
        driver: &dyn Driver,
        filter: Filter,
        mut options: FindOptions,
    ) -> Result<Vec<Self>> {
        for (field, _) in &mut options.sort {
            if field == ID {
                *field = ID_FIELD.to_string();
            }
        }
        let collection = Self::collection_name();
        let cursor = driver
            .find(collection, &storage_filter(filter), options)
            .await?;
        debug!(collection, matched = cursor.remaining(), "Find");
        cursor.map(Self::from_storage).collect()
    }

    /// The first document matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `DataError::CorruptRecord` if the stored document cannot be read.
    pub async fn find_one(driver: &dyn Driver, filter: Filter) -> Result<Option<Self>> {
        driver
            .find_one(Self::collection_name(), &storage_filter(filter))
            .await?
            .map(Self::from_storage)
            .transpose()
    }

    /// Count the documents matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn count(driver: &dyn Driver, filter: Filter) -> Result<u64> {
        Ok(driver
            .count(Self::collection_name(), &storage_filter(filter))
            .await?)
    }

    /// Delete this document only.
    ///
    /// # Errors
    ///
    /// Returns `DataError::Validation` if the document has not been inserted.
    pub async fn delete(&self, driver: &dyn Driver) -> Result<()> {
        let id = self.stored_id()?;
        let collection = Self::collection_name();
        let deleted = driver.delete_many(collection, &id_filter(id)).await?;
        debug!(collection, %id, deleted, "Deleted document");
        Ok(())
    }

    /// Delete every document matching `filter`, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn delete_all(driver: &dyn Driver, filter: Filter) -> Result<u64> {
        let collection = Self::collection_name();
        let deleted = driver
            .delete_many(collection, &storage_filter(filter))
            .await?;
        debug!(collection, deleted, "Deleted documents");
        Ok(deleted)
    }

    /// Delete this document and everything it owns, children first.
    ///
    /// Each step is a separate store call. If one fails the error is returned
    /// and whatever was already deleted stays deleted.
    ///
    /// # Errors
    ///
    /// Returns `DataError::Validation` if the document has not been inserted,
    /// or the first store error encountered.
    pub async fn delete_cascade(&self, driver: &dyn Driver) -> Result<()> {
        let id = self.stored_id()?;
        let schema = E::schema();
        let stored = self.to_storage();
        if let Err(err) = delete_children(driver, schema, &stored).await {
            warn!(
                collection = schema.collection,
                %id,
                error = %err,
                "Cascade delete failed part-way, children may be left behind"
            );
            return Err(err);
        }
        self.delete(driver).await?;
        info!(collection = schema.collection, %id, "Deleted document with its children");
        Ok(())
    }

    /// Register the indexes declared by `E`.
    ///
    /// # Errors
    ///
    /// Returns `DataError::UniqueConstraintViolation` if existing documents
    /// already violate a unique index.
    pub async fn create_indexes(driver: &dyn Driver) -> Result<()> {
        let schema = E::schema();
        for spec in schema.index_specs() {
            driver.create_index(schema.collection, spec).await?;
        }
        Ok(())
    }
}

fn parse_id(value: &Value) -> Result<Uuid> {
    value
        .as_uuid()
        .ok_or_else(|| DataError::validation(ID, format!("expected uuid, got {}", value.kind())))
}

fn id_filter(id: Uuid) -> Filter {
    Filter::new().eq(ID_FIELD, id)
}

fn storage_filter(filter: Filter) -> Filter {
    filter
        .rename_field(ID, ID_FIELD)
        .map_values(|_, value| to_stored(value))
}

/// Lower a typed value to what the store holds.
fn to_stored(value: Value) -> Value {
    escape_value(lower_enums(value))
}

fn lower_enums(value: Value) -> Value {
    match value {
        Value::Enum(member) => Value::String(member.variant.to_string()),
        Value::List(items) => Value::List(items.into_iter().map(lower_enums).collect()),
        Value::Map(map) => Value::Map(map.into_iter().map(|(k, v)| (k, lower_enums(v))).collect()),
        other => other,
    }
}

fn from_stored(collection: &str, field: &Field, stored: Value) -> Result<Value> {
    match (field.field_type, unescape_value(stored)) {
        (FieldType::Enum(table), Value::String(name)) => {
            table.resolve(&name).map(Value::Enum).ok_or_else(|| {
                DataError::corrupt(
                    collection,
                    field.name,
                    format!("unknown {} member {name:?}", table.name),
                )
            })
        }
        (_, value) => Ok(value),
    }
}

fn delete_children<'a>(
    driver: &'a dyn Driver,
    schema: &'static Schema,
    parent: &'a RawDocument,
) -> BoxFuture<'a, Result<()>> {
    async move {
        for link in schema.children {
            let child = link.child;
            let filter = (link.scope)(parent);
            if !child.children.is_empty() {
                let owned = driver
                    .find(child.collection, &filter, FindOptions::default())
                    .await?;
                for document in owned {
                    delete_children(driver, child, &document).await?;
                }
            }
            let deleted = driver.delete_many(child.collection, &filter).await?;
            debug!(
                parent = schema.collection,
                collection = child.collection,
                deleted,
                "Cascade deleted children"
            );
        }
        Ok(())
    }
    .boxed()
}

/// The stored value of `key` in a parent document, for building cascade scopes.
pub(crate) fn parent_value(parent: &RawDocument, key: &str) -> Value {
    parent.get(key).cloned().unwrap_or_default()
}
