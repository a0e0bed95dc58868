//! Projects and the environments they own.

use orchstate_core::RawDocument;
use orchstate_store::{Driver, Filter, ID_FIELD};
use uuid::Uuid;

use crate::document::{parent_value, Document};
use crate::error::Result;
use crate::field::{defaults, Field, FieldType};
use crate::schema::{Cascade, Entity, Index, Schema};

use super::action::RESOURCE_ACTION;
use super::agent::{AGENT, AGENT_INSTANCE, AGENT_PROCESS};
use super::model::CONFIGURATION_MODEL;
use super::resource::RESOURCE;
use super::snapshot::SNAPSHOT;

/// A named grouping of environments.
#[derive(Debug, Clone, Copy)]
pub struct Project;

pub(crate) static PROJECT: Schema = Schema {
    collection: "Project",
    fields: &[Field::required("name", FieldType::String)],
    indexes: &[Index {
        fields: &["name"],
        unique: true,
    }],
    children: &[Cascade {
        child: &ENVIRONMENT,
        scope: owned_by_project,
    }],
};

fn owned_by_project(project: &RawDocument) -> Filter {
    Filter::new().eq("project", parent_value(project, ID_FIELD))
}

impl Entity for Project {
    fn schema() -> &'static Schema {
        &PROJECT
    }
}

impl Document<Project> {
    /// Look up a project by its unique name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the record is corrupt.
    pub async fn get_by_name(driver: &dyn Driver, name: &str) -> Result<Option<Self>> {
        Self::find_one(driver, Filter::new().eq("name", name)).await
    }
}

/// A deployment target within a project. Everything else is scoped to one.
#[derive(Debug, Clone, Copy)]
pub struct Environment;

fn scoped_to_environment(environment: &RawDocument) -> Filter {
    Filter::new().eq("environment", parent_value(environment, ID_FIELD))
}

fn instances_of_environment(environment: &RawDocument) -> Filter {
    Filter::new().eq("tid", parent_value(environment, ID_FIELD))
}

pub(crate) static ENVIRONMENT: Schema = Schema {
    collection: "Environment",
    fields: &[
        Field::required("name", FieldType::String),
        Field::required("project", FieldType::Uuid),
        Field::optional("repo_url", FieldType::String, defaults::empty_string),
        Field::optional("repo_branch", FieldType::String, defaults::empty_string),
        Field::optional("settings", FieldType::Map, defaults::empty_map),
    ],
    indexes: &[Index {
        fields: &["project"],
        unique: false,
    }],
    children: &[
        Cascade {
            child: &AGENT_PROCESS,
            scope: scoped_to_environment,
        },
        Cascade {
            child: &AGENT_INSTANCE,
            scope: instances_of_environment,
        },
        Cascade {
            child: &AGENT,
            scope: scoped_to_environment,
        },
        Cascade {
            child: &CONFIGURATION_MODEL,
            scope: scoped_to_environment,
        },
        Cascade {
            child: &RESOURCE,
            scope: scoped_to_environment,
        },
        Cascade {
            child: &RESOURCE_ACTION,
            scope: scoped_to_environment,
        },
        Cascade {
            child: &SNAPSHOT,
            scope: scoped_to_environment,
        },
    ],
};

impl Entity for Environment {
    fn schema() -> &'static Schema {
        &ENVIRONMENT
    }
}

impl Document<Environment> {
    /// The environments of a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or a record is corrupt.
    pub async fn get_for_project(driver: &dyn Driver, project: Uuid) -> Result<Vec<Self>> {
        Self::get_list(driver, Filter::new().eq("project", project)).await
    }
}
