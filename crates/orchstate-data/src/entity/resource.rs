//! Versioned resources and the queries that reason across versions.

use std::collections::{BTreeMap, HashSet};

use orchstate_core::{ResourceVersionId, Value};
use orchstate_store::{Driver, Filter, FindOptions, SortOrder};
use tracing::debug;
use uuid::Uuid;

use crate::document::Document;
use crate::enums::ResourceState;
use crate::error::Result;
use crate::field::{defaults, Field, FieldType, StoredEnum};
use crate::schema::{Entity, Index, Schema};

use super::model::ConfigurationModel;

/// One resource of one configuration model version.
#[derive(Debug, Clone, Copy)]
pub struct Resource;

fn available() -> Value {
    ResourceState::Available.to_value()
}

pub(crate) static RESOURCE: Schema = Schema {
    collection: "Resource",
    fields: &[
        Field::required("environment", FieldType::Uuid),
        Field::required("model", FieldType::Int),
        Field::required("resource_id", FieldType::String),
        Field::required("resource_type", FieldType::String),
        Field::required("agent", FieldType::String),
        Field::required("id_attribute_name", FieldType::String),
        Field::required("id_attribute_value", FieldType::String),
        Field::required("resource_version_id", FieldType::String),
        Field::nullable("last_deploy", FieldType::DateTime),
        Field::optional("attributes", FieldType::Map, defaults::empty_map),
        Field::optional("status", FieldType::Enum(ResourceState::TABLE), available),
    ],
    indexes: &[
        Index {
            fields: &["environment", "resource_version_id"],
            unique: true,
        },
        Index {
            fields: &["environment", "resource_id"],
            unique: false,
        },
        Index {
            fields: &["environment", "model"],
            unique: false,
        },
    ],
    children: &[],
};

impl Entity for Resource {
    fn schema() -> &'static Schema {
        &RESOURCE
    }
}

impl Document<Resource> {
    /// Build a resource from its composite identifier.
    ///
    /// `model`, `resource_id`, `resource_type`, `agent` and the id attribute
    /// are derived from `resource_version_id` and take precedence over the
    /// same names in `fields`.
    ///
    /// # Errors
    ///
    /// Returns `DataError::InvalidResourceId` for a malformed identifier and
    /// the usual construction errors for `fields`.
    pub fn new_versioned<I, K, V>(
        environment: Uuid,
        resource_version_id: &str,
        fields: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let parsed: ResourceVersionId = resource_version_id.parse()?;
        let id = parsed.resource_id();

        let mut all: Vec<(String, Value)> = fields
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.into()))
            .collect();
        all.extend([
            ("environment".to_string(), Value::Uuid(environment)),
            ("model".to_string(), Value::Int(parsed.version())),
            ("resource_id".to_string(), Value::from(id.to_string())),
            ("resource_type".to_string(), Value::from(id.entity_type())),
            ("agent".to_string(), Value::from(id.agent())),
            ("id_attribute_name".to_string(), Value::from(id.attribute_name())),
            ("id_attribute_value".to_string(), Value::from(id.attribute_value())),
            ("resource_version_id".to_string(), Value::from(parsed.to_string())),
        ]);
        Self::new(all)
    }

    /// The composite identifier including the version.
    #[must_use]
    pub fn resource_version_id(&self) -> &str {
        self.str_field("resource_version_id").unwrap_or_default()
    }

    /// The version-independent identifier.
    #[must_use]
    pub fn resource_id(&self) -> &str {
        self.str_field("resource_id").unwrap_or_default()
    }

    /// The configuration model version this resource belongs to.
    #[must_use]
    pub fn model(&self) -> i64 {
        self.int_field("model").unwrap_or_default()
    }

    /// The deploy state.
    #[must_use]
    pub fn status(&self) -> Option<ResourceState> {
        self.enum_field("status")
    }

    /// The desired attributes.
    #[must_use]
    pub fn attributes(&self) -> Option<&BTreeMap<String, Value>> {
        self.map_field("attributes")
    }

    fn attribute_flag(&self, name: &str) -> bool {
        self.attributes()
            .and_then(|attrs| attrs.get(name))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Returns true if the resource should be removed once it leaves the
    /// desired state, and was not already removed.
    #[must_use]
    pub fn should_purge_on_delete(&self) -> bool {
        self.attribute_flag("purge_on_delete") && !self.attribute_flag("purged")
    }

    /// The newest row of a resource across all versions.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the record is corrupt.
    pub async fn get_latest_version(
        driver: &dyn Driver,
        environment: Uuid,
        resource_id: &str,
    ) -> Result<Option<Self>> {
        let filter = Filter::new()
            .eq("environment", environment)
            .eq("resource_id", resource_id);
        let options = FindOptions::default()
            .sort("model", SortOrder::Descending)
            .limit(1);
        let mut found = Self::find(driver, filter, options).await?;
        Ok(found.pop())
    }

    /// The stored subset of the given composite identifiers. Unknown
    /// identifiers are left out.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or a record is corrupt.
    pub async fn get_resources<S: AsRef<str>>(
        driver: &dyn Driver,
        environment: Uuid,
        resource_version_ids: &[S],
    ) -> Result<Vec<Self>> {
        let filter = Filter::new().eq("environment", environment).is_in(
            "resource_version_id",
            resource_version_ids.iter().map(AsRef::as_ref),
        );
        Self::get_list(driver, filter).await
    }

    /// The resources of one version, optionally only those of one agent.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or a record is corrupt.
    pub async fn get_resources_for_version(
        driver: &dyn Driver,
        environment: Uuid,
        version: i64,
        agent: Option<&str>,
    ) -> Result<Vec<Self>> {
        let mut filter = Filter::new()
            .eq("environment", environment)
            .eq("model", version);
        if let Some(agent) = agent {
            filter = filter.eq("agent", agent);
        }
        Self::get_list(driver, filter).await
    }

    /// Resources that must be purged when `version` is deployed.
    ///
    /// A resource qualifies if it was deployed in the newest released and
    /// deployed version before `version`, is marked purge-on-delete and not yet
    /// purged there, and no resource with the same `resource_id` exists in
    /// `version`. Versions in between that were never released or deployed
    /// play no part. The returned rows are those of the earlier version.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or a record is corrupt.
    pub async fn get_deleted_resources(
        driver: &dyn Driver,
        environment: Uuid,
        version: i64,
    ) -> Result<Vec<Self>> {
        let Some(previous) =
            Document::<ConfigurationModel>::last_deployed_before(driver, environment, version)
                .await?
        else {
            return Ok(Vec::new());
        };

        let filter = Filter::new()
            .eq("environment", environment)
            .eq("model", previous.version())
            .eq("status", ResourceState::Deployed);
        let candidates: Vec<Self> = Self::get_list(driver, filter)
            .await?
            .into_iter()
            .filter(Self::should_purge_on_delete)
            .collect();

        let current = Self::get_resources_for_version(driver, environment, version, None).await?;
        let present: HashSet<&str> = current.iter().map(Self::resource_id).collect();

        let deleted: Vec<Self> = candidates
            .into_iter()
            .filter(|resource| !present.contains(resource.resource_id()))
            .collect();
        debug!(
            %environment,
            version,
            previous = previous.version(),
            deleted = deleted.len(),
            "Computed purge candidates"
        );
        Ok(deleted)
    }
}
