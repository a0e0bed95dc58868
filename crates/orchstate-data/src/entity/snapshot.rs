//! Snapshots of the state of an environment's resources.

use chrono::Utc;
use orchstate_core::Value;
use orchstate_store::Driver;
use tracing::info;

use crate::document::Document;
use crate::error::Result;
use crate::field::{defaults, Field, FieldType};
use crate::schema::{Entity, Index, Schema};

/// Progress of a snapshot over the resources of one version.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot;

pub(crate) static SNAPSHOT: Schema = Schema {
    collection: "Snapshot",
    fields: &[
        Field::required("environment", FieldType::Uuid),
        Field::required("model", FieldType::Int),
        Field::required("name", FieldType::String),
        Field::required("started", FieldType::DateTime),
        Field::nullable("finished", FieldType::DateTime),
        Field::optional("total_size", FieldType::Int, defaults::zero),
        Field::optional("resources_todo", FieldType::Int, defaults::zero),
    ],
    indexes: &[Index {
        fields: &["environment"],
        unique: false,
    }],
    children: &[],
};

impl Entity for Snapshot {
    fn schema() -> &'static Schema {
        &SNAPSHOT
    }
}

impl Document<Snapshot> {
    /// Returns true once every resource has been handled.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.datetime_field("finished").is_some()
    }

    /// Record that one more resource was stored, adding `size` bytes.
    ///
    /// The snapshot is marked finished when no resources remain.
    ///
    /// # Errors
    ///
    /// Returns `DataError::Validation` if the snapshot was never inserted.
    pub async fn resource_updated(&mut self, driver: &dyn Driver, size: i64) -> Result<()> {
        let todo = self.int_field("resources_todo").unwrap_or_default() - 1;
        let total = self.int_field("total_size").unwrap_or_default() + size;

        let mut changes = vec![
            ("resources_todo", Value::Int(todo)),
            ("total_size", Value::Int(total)),
        ];
        let finishing = todo <= 0 && !self.is_finished();
        if finishing {
            changes.push(("finished", Value::DateTime(Utc::now())));
        }
        self.update(driver, changes).await?;

        if finishing {
            info!(
                snapshot = ?self.id(),
                name = self.str_field("name").unwrap_or_default(),
                total_size = total,
                "Snapshot finished"
            );
        }
        Ok(())
    }
}
