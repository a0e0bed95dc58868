//! Agent processes, their instances, and the logical agents they serve.

use orchstate_core::{RawDocument, Value};
use orchstate_store::{Driver, Filter, ID_FIELD};
use uuid::Uuid;

use crate::document::{parent_value, Document};
use crate::error::Result;
use crate::field::{defaults, Field, FieldType};
use crate::schema::{Cascade, Entity, Index, Schema};

/// A running agent process on some host.
#[derive(Debug, Clone, Copy)]
pub struct AgentProcess;

fn instances_of_process(process: &RawDocument) -> Filter {
    Filter::new().eq("process", parent_value(process, ID_FIELD))
}

pub(crate) static AGENT_PROCESS: Schema = Schema {
    collection: "AgentProcess",
    fields: &[
        Field::required("hostname", FieldType::String),
        Field::required("environment", FieldType::Uuid),
        Field::nullable("first_seen", FieldType::DateTime),
        Field::nullable("last_seen", FieldType::DateTime),
        Field::nullable("expired", FieldType::DateTime),
        Field::required("sid", FieldType::Uuid),
    ],
    indexes: &[Index {
        fields: &["sid"],
        unique: false,
    }],
    children: &[Cascade {
        child: &AGENT_INSTANCE,
        scope: instances_of_process,
    }],
};

impl Entity for AgentProcess {
    fn schema() -> &'static Schema {
        &AGENT_PROCESS
    }
}

impl Document<AgentProcess> {
    /// The process registered under a session id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the record is corrupt.
    pub async fn get_by_sid(driver: &dyn Driver, sid: Uuid) -> Result<Option<Self>> {
        Self::find_one(driver, Filter::new().eq("sid", sid)).await
    }

    /// Processes that have not expired, optionally limited to one environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or a record is corrupt.
    pub async fn get_live(driver: &dyn Driver, environment: Option<Uuid>) -> Result<Vec<Self>> {
        let mut filter = Filter::new().eq("expired", Value::Null);
        if let Some(environment) = environment {
            filter = filter.eq("environment", environment);
        }
        Self::get_list(driver, filter).await
    }
}

/// One agent endpoint served by a process.
#[derive(Debug, Clone, Copy)]
pub struct AgentInstance;

pub(crate) static AGENT_INSTANCE: Schema = Schema {
    collection: "AgentInstance",
    fields: &[
        Field::required("process", FieldType::Uuid),
        Field::required("name", FieldType::String),
        Field::nullable("expired", FieldType::DateTime),
        Field::required("tid", FieldType::Uuid),
    ],
    indexes: &[Index {
        fields: &["process"],
        unique: false,
    }],
    children: &[],
};

impl Entity for AgentInstance {
    fn schema() -> &'static Schema {
        &AGENT_INSTANCE
    }
}

impl Document<AgentInstance> {
    /// Unexpired instances serving `name` in an environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or a record is corrupt.
    pub async fn get_active(driver: &dyn Driver, tid: Uuid, name: &str) -> Result<Vec<Self>> {
        let filter = Filter::new()
            .eq("tid", tid)
            .eq("name", name)
            .eq("expired", Value::Null);
        Self::get_list(driver, filter).await
    }

    /// The process this instance runs in.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the record is corrupt.
    pub async fn process(&self, driver: &dyn Driver) -> Result<Option<Document<AgentProcess>>> {
        match self.uuid_field("process") {
            Some(process) => Document::<AgentProcess>::get_by_id(driver, process).await,
            None => Ok(None),
        }
    }
}

/// A logical agent in an environment. Its `primary` names the instance
/// currently acting for it; the reference does not own the instance.
#[derive(Debug, Clone, Copy)]
pub struct Agent;

pub(crate) static AGENT: Schema = Schema {
    collection: "Agent",
    fields: &[
        Field::required("environment", FieldType::Uuid),
        Field::required("name", FieldType::String),
        Field::nullable("last_failover", FieldType::DateTime),
        Field::optional("paused", FieldType::Bool, defaults::falsy),
        Field::nullable("primary", FieldType::Uuid),
    ],
    indexes: &[Index {
        fields: &["environment", "name"],
        unique: true,
    }],
    children: &[],
};

impl Entity for Agent {
    fn schema() -> &'static Schema {
        &AGENT
    }
}

impl Document<Agent> {
    /// Look up an agent by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the record is corrupt.
    pub async fn get_by_name(
        driver: &dyn Driver,
        environment: Uuid,
        name: &str,
    ) -> Result<Option<Self>> {
        let filter = Filter::new()
            .eq("environment", environment)
            .eq("name", name);
        Self::find_one(driver, filter).await
    }

    /// The instance currently acting as primary, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the record is corrupt.
    pub async fn primary_instance(
        &self,
        driver: &dyn Driver,
    ) -> Result<Option<Document<AgentInstance>>> {
        match self.uuid_field("primary") {
            Some(primary) => Document::<AgentInstance>::get_by_id(driver, primary).await,
            None => Ok(None),
        }
    }

    /// Returns true if the agent is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.bool_field("paused").unwrap_or(false)
    }
}
