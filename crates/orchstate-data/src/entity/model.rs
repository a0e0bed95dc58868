//! Configuration model versions.

use std::collections::BTreeSet;

use orchstate_core::{IdError, RawDocument, ResourceVersionId, Value};
use orchstate_store::{Driver, Filter, FindOptions, SortOrder};
use tracing::info;
use uuid::Uuid;

use crate::document::{parent_value, Document};
use crate::enums::{ResourceState, VersionState};
use crate::error::{DataError, Result};
use crate::field::{defaults, Field, FieldType, StoredEnum};
use crate::schema::{Cascade, Entity, Index, Schema};

use super::resource::{Resource, RESOURCE};

/// One version of the desired state of an environment.
#[derive(Debug, Clone, Copy)]
pub struct ConfigurationModel;

fn pending() -> Value {
    VersionState::Pending.to_value()
}

fn resources_of_version(model: &RawDocument) -> Filter {
    Filter::new()
        .eq("environment", parent_value(model, "environment"))
        .eq("model", parent_value(model, "version"))
}

pub(crate) static CONFIGURATION_MODEL: Schema = Schema {
    collection: "ConfigurationModel",
    fields: &[
        Field::required("environment", FieldType::Uuid),
        Field::required("version", FieldType::Int),
        Field::nullable("date", FieldType::DateTime),
        Field::optional("released", FieldType::Bool, defaults::falsy),
        Field::optional("deployed", FieldType::Bool, defaults::falsy),
        Field::optional("result", FieldType::Enum(VersionState::TABLE), pending),
        Field::optional("version_info", FieldType::Map, defaults::empty_map),
        Field::optional("total", FieldType::Int, defaults::zero),
    ],
    indexes: &[Index {
        fields: &["environment", "version"],
        unique: true,
    }],
    children: &[Cascade {
        child: &RESOURCE,
        scope: resources_of_version,
    }],
};

impl Entity for ConfigurationModel {
    fn schema() -> &'static Schema {
        &CONFIGURATION_MODEL
    }
}

fn newest_first() -> FindOptions {
    FindOptions::default().sort("version", SortOrder::Descending)
}

impl Document<ConfigurationModel> {
    /// The version number.
    #[must_use]
    pub fn version(&self) -> i64 {
        self.int_field("version").unwrap_or_default()
    }

    /// The environment this version belongs to.
    #[must_use]
    pub fn environment(&self) -> Option<Uuid> {
        self.uuid_field("environment")
    }

    /// Returns true if the version was released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.bool_field("released").unwrap_or(false)
    }

    /// Returns true if the version was deployed.
    #[must_use]
    pub fn is_deployed(&self) -> bool {
        self.bool_field("deployed").unwrap_or(false)
    }

    /// Versions of an environment, newest first, skipping `offset` and
    /// returning at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or a record is corrupt.
    pub async fn get_versions(
        driver: &dyn Driver,
        environment: Uuid,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<Self>> {
        let mut options = newest_first().skip(offset);
        if let Some(limit) = limit {
            options = options.limit(limit);
        }
        Self::find(driver, Filter::new().eq("environment", environment), options).await
    }

    /// One version of an environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the record is corrupt.
    pub async fn get_version(
        driver: &dyn Driver,
        environment: Uuid,
        version: i64,
    ) -> Result<Option<Self>> {
        let filter = Filter::new()
            .eq("environment", environment)
            .eq("version", version);
        Self::find_one(driver, filter).await
    }

    /// The newest released version of an environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the record is corrupt.
    pub async fn get_latest_released(driver: &dyn Driver, environment: Uuid) -> Result<Option<Self>> {
        let filter = Filter::new()
            .eq("environment", environment)
            .eq("released", true);
        let mut found = Self::find(driver, filter, newest_first().limit(1)).await?;
        Ok(found.pop())
    }

    /// The newest version below `version` that was both released and deployed.
    ///
    /// Versions that were never released or deployed are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the record is corrupt.
    pub async fn last_deployed_before(
        driver: &dyn Driver,
        environment: Uuid,
        version: i64,
    ) -> Result<Option<Self>> {
        let filter = Filter::new()
            .eq("environment", environment)
            .eq("released", true)
            .eq("deployed", true)
            .lt("version", version);
        let mut found = Self::find(driver, filter, newest_first().limit(1)).await?;
        Ok(found.pop())
    }

    /// Distinct agent names referenced by the resources of one version.
    ///
    /// # Errors
    ///
    /// Returns `DataError::CorruptRecord` if a stored resource carries a
    /// malformed identifier.
    pub async fn get_agents(
        driver: &dyn Driver,
        environment: Uuid,
        version: i64,
    ) -> Result<BTreeSet<String>> {
        let resources =
            Document::<Resource>::get_resources_for_version(driver, environment, version, None)
                .await?;
        let mut agents = BTreeSet::new();
        for resource in resources {
            let id: ResourceVersionId = resource
                .resource_version_id()
                .parse()
                .map_err(|e: IdError| {
                    DataError::corrupt(RESOURCE.collection, "resource_version_id", e.to_string())
                })?;
            agents.insert(id.agent().to_string());
        }
        Ok(agents)
    }

    /// Number of resources of this version that reached a done state.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn done_count(&self, driver: &dyn Driver) -> Result<u64> {
        let filter = Filter::new()
            .eq("environment", self.environment())
            .eq("model", self.version())
            .is_in("status", ResourceState::done_states());
        Document::<Resource>::count(driver, filter).await
    }

    /// Delete the oldest versions of an environment, keeping the newest `keep`.
    ///
    /// The latest released version is never deleted. Each deleted version
    /// takes its resources with it. Returns the number of versions deleted.
    ///
    /// # Errors
    ///
    /// Returns the first store error; versions deleted before it stay deleted.
    pub async fn purge_versions(driver: &dyn Driver, environment: Uuid, keep: usize) -> Result<usize> {
        let latest_released = Self::get_latest_released(driver, environment)
            .await?
            .map(|model| model.version());
        let stale = Self::get_versions(driver, environment, keep, None).await?;

        let mut deleted = 0;
        for model in stale {
            if Some(model.version()) == latest_released {
                continue;
            }
            model.delete_cascade(driver).await?;
            deleted += 1;
        }
        info!(%environment, keep, deleted, ?latest_released, "Purged old versions");
        Ok(deleted)
    }
}
