//! Core types for orchstate.
//!
//! This crate provides the foundational types shared by the store driver and the
//! document mapper:
//!
//! - **Values**: the dynamically typed [`Value`] tree every document is made of
//! - **Identifiers**: composite resource identifiers ([`ResourceId`],
//!   [`ResourceVersionId`])
//!
//! # Example
//!
//! ```
//! use orchstate_core::ResourceVersionId;
//!
//! let rvid: ResourceVersionId = "std::File[agent1,path=/etc/motd],v=3".parse().unwrap();
//! assert_eq!(rvid.agent(), "agent1");
//! assert_eq!(rvid.resource_id().to_string(), "std::File[agent1,path=/etc/motd]");
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;
pub mod value;

pub use ids::{IdError, ResourceId, ResourceVersionId};
pub use value::{EnumValue, RawDocument, Value};
