//! The persisted entities of an orchestration server.
//!
//! A project owns environments; every other entity is scoped to an
//! environment and removed with it:
//!
//! ```text
//! Project
//! └── Environment
//!     ├── AgentProcess ── AgentInstance
//!     ├── AgentInstance
//!     ├── Agent
//!     ├── ConfigurationModel ── Resource (same version)
//!     ├── Resource
//!     ├── ResourceAction
//!     └── Snapshot
//! ```

mod action;
mod agent;
mod model;
mod project;
mod resource;
mod snapshot;

pub use action::{LogLine, ResourceAction};
pub use agent::{Agent, AgentInstance, AgentProcess};
pub use model::ConfigurationModel;
pub use project::{Environment, Project};
pub use resource::Resource;
pub use snapshot::Snapshot;

use orchstate_store::Driver;

use crate::document::Document;
use crate::error::Result;

/// Register the indexes of every entity.
///
/// # Errors
///
/// Returns `DataError::UniqueConstraintViolation` if stored documents already
/// violate a unique index.
pub async fn create_indexes(driver: &dyn Driver) -> Result<()> {
    Document::<Project>::create_indexes(driver).await?;
    Document::<Environment>::create_indexes(driver).await?;
    Document::<AgentProcess>::create_indexes(driver).await?;
    Document::<AgentInstance>::create_indexes(driver).await?;
    Document::<Agent>::create_indexes(driver).await?;
    Document::<ConfigurationModel>::create_indexes(driver).await?;
    Document::<Resource>::create_indexes(driver).await?;
    Document::<ResourceAction>::create_indexes(driver).await?;
    Document::<Snapshot>::create_indexes(driver).await?;
    Ok(())
}
