//! Typed document mapping for orchstate.
//!
//! This crate maps the entities of an orchestration server onto the
//! schemaless store of `orchstate-store`, and answers the queries that reason
//! across configuration model versions.
//!
//! # Architecture
//!
//! - [`field`]: field descriptors (type, requiredness, default function)
//! - [`schema`]: the static per-entity table of fields, indexes and cascades
//! - [`document`]: [`Document<E>`], construction, storage conversion and CRUD
//! - [`escape`]: reversible escaping of map keys the store forbids
//! - [`entity`]: the concrete entities and their lifecycle queries
//!
//! # Example
//!
//! ```
//! use orchstate_data::entity::Project;
//! use orchstate_data::{Document, Filter};
//! use orchstate_store::MemoryDriver;
//!
//! # async fn example() -> orchstate_data::Result<()> {
//! let driver = MemoryDriver::new();
//! orchstate_data::entity::create_indexes(&driver).await?;
//!
//! let mut project = Document::<Project>::new([("name", "test")])?;
//! project.insert(&driver).await?;
//!
//! let found = Document::<Project>::get_list(&driver, Filter::new().eq("name", "test")).await?;
//! assert_eq!(found[0].id(), project.id());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod document;
pub mod entity;
pub mod enums;
pub mod error;
pub mod escape;
pub mod field;
pub mod schema;

pub use config::DataConfig;
pub use document::{Document, Origin, ID};
pub use enums::{ResourceActionKind, ResourceState, VersionState};
pub use error::{DataError, Result};
pub use field::{defaults, DefaultFn, EnumTable, Field, FieldType, StoredEnum};
pub use schema::{Cascade, Entity, Index, Schema};

pub use orchstate_core::{RawDocument, ResourceId, ResourceVersionId, Value};
pub use orchstate_store::{Driver, Filter, FindOptions, SortOrder};
