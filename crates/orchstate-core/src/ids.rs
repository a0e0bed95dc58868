//! Composite resource identifiers.
//!
//! A resource is addressed by `<type>[<agent>,<key>=<value>,...]`; pinning it to a
//! configuration model version appends `,v=<version>`. Both forms round-trip
//! through [`FromStr`] and [`fmt::Display`] without changing a single byte.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<type>[^\[\],]+)\[(?P<agent>[^,\[\]]+),(?P<attrs>[^\[\]]+)\](?:,v=(?P<version>[0-9]+))?$",
    )
    .unwrap_or_else(|e| unreachable!("resource id pattern is valid: {e}"))
});

/// Errors raised while parsing a composite identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The string does not follow `<type>[<agent>,<key>=<value>,...]`.
    #[error("malformed resource identifier: {0}")]
    Malformed(String),

    /// A versioned identifier was expected but `,v=<version>` is missing.
    #[error("resource identifier has no version: {0}")]
    MissingVersion(String),

    /// A version-independent identifier carries a version suffix.
    #[error("resource identifier must not carry a version: {0}")]
    UnexpectedVersion(String),

    /// The version suffix does not fit a signed 64-bit integer.
    #[error("invalid version in resource identifier: {0}")]
    InvalidVersion(String),
}

/// Version-independent resource identifier, e.g. `std::File[agent1,path=/etc/motd]`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId {
    entity_type: String,
    agent: String,
    attributes: Vec<(String, String)>,
}

impl ResourceId {
    /// Resource type, e.g. `std::File`.
    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Name of the agent that manages the resource.
    #[must_use]
    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Discriminating attributes in declaration order.
    #[must_use]
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Name of the first discriminating attribute.
    #[must_use]
    pub fn attribute_name(&self) -> &str {
        self.attributes.first().map_or("", |(k, _)| k.as_str())
    }

    /// Value of the first discriminating attribute.
    #[must_use]
    pub fn attribute_value(&self) -> &str {
        self.attributes.first().map_or("", |(_, v)| v.as_str())
    }

    /// Pin this resource to a configuration model version.
    #[must_use]
    pub fn with_version(&self, version: i64) -> ResourceVersionId {
        ResourceVersionId {
            id: self.clone(),
            version,
        }
    }

    fn parse_parts(s: &str) -> Result<(Self, Option<&str>), IdError> {
        let caps = ID_PATTERN
            .captures(s)
            .ok_or_else(|| IdError::Malformed(s.to_string()))?;

        let mut attributes = Vec::new();
        for pair in caps["attrs"].split(',') {
            let (key, value) = pair
                .split_once('=')
                .filter(|(k, _)| !k.is_empty())
                .ok_or_else(|| IdError::Malformed(s.to_string()))?;
            attributes.push((key.to_string(), value.to_string()));
        }

        let id = Self {
            entity_type: caps["type"].to_string(),
            agent: caps["agent"].to_string(),
            attributes,
        };
        Ok((id, caps.name("version").map(|m| m.as_str())))
    }
}

impl FromStr for ResourceId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::parse_parts(s)? {
            (id, None) => Ok(id),
            (_, Some(_)) => Err(IdError::UnexpectedVersion(s.to_string())),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}", self.entity_type, self.agent)?;
        for (key, value) in &self.attributes {
            write!(f, ",{key}={value}")?;
        }
        f.write_str("]")
    }
}

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId({self})")
    }
}

impl TryFrom<String> for ResourceId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.to_string()
    }
}

/// Resource identifier pinned to a version, e.g. `std::File[agent1,path=/etc/motd],v=3`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceVersionId {
    id: ResourceId,
    version: i64,
}

impl ResourceVersionId {
    /// The version-independent part of the identifier.
    #[must_use]
    pub const fn resource_id(&self) -> &ResourceId {
        &self.id
    }

    /// The configuration model version.
    #[must_use]
    pub const fn version(&self) -> i64 {
        self.version
    }

    /// Shorthand for `resource_id().agent()`.
    #[must_use]
    pub fn agent(&self) -> &str {
        self.id.agent()
    }
}

impl FromStr for ResourceVersionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, version) = ResourceId::parse_parts(s)?;
        let version = version.ok_or_else(|| IdError::MissingVersion(s.to_string()))?;
        let version = version
            .parse()
            .map_err(|_| IdError::InvalidVersion(s.to_string()))?;
        Ok(Self { id, version })
    }
}

impl fmt::Display for ResourceVersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},v={}", self.id, self.version)
    }
}

impl fmt::Debug for ResourceVersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceVersionId({self})")
    }
}

impl TryFrom<String> for ResourceVersionId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResourceVersionId> for String {
    fn from(id: ResourceVersionId) -> Self {
        id.to_string()
    }
}
