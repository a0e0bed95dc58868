//! Enumerations exposed at the storage boundary.
//!
//! Each enumeration is stored by name. The name tables below are the only place
//! the mapping is defined.

use std::fmt;

use orchstate_core::Value;

use crate::field::{EnumTable, StoredEnum};

macro_rules! stored_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $stored:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl StoredEnum for $name {
            const TABLE: &'static EnumTable = &EnumTable {
                name: stringify!($name),
                variants: &[$($stored),+],
            };

            fn variant(self) -> &'static str {
                match self {
                    $( Self::$variant => $stored ),+
                }
            }

            fn from_variant(name: &str) -> Option<Self> {
                match name {
                    $( $stored => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for Value {
            fn from(value: $name) -> Self {
                value.to_value()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.variant())
            }
        }
    };
}

stored_enum! {
    /// Deploy state of a resource.
    ResourceState {
        /// Not yet acted upon.
        Available => "available",
        /// An agent is applying the resource.
        Deploying => "deploying",
        /// The resource was applied successfully.
        Deployed => "deployed",
        /// Applying the resource failed.
        Failed => "failed",
        /// A dependency failed, so the resource was not applied.
        Skipped => "skipped",
        /// Deployment was cancelled.
        Cancelled => "cancelled",
        /// The resource depends on unknown values.
        Undefined => "undefined",
        /// The resource is handling events from its dependencies.
        ProcessingEvents => "processing_events",
        /// No agent could handle the resource.
        Unavailable => "unavailable",
    }
}

impl ResourceState {
    /// Returns true for states that end a deployment of the resource.
    #[must_use]
    pub const fn is_done(self) -> bool {
        matches!(
            self,
            Self::Deployed
                | Self::Failed
                | Self::Skipped
                | Self::Cancelled
                | Self::Undefined
                | Self::Unavailable
        )
    }

    /// All members that end a deployment.
    #[must_use]
    pub fn done_states() -> Vec<Self> {
        [
            Self::Available,
            Self::Deploying,
            Self::Deployed,
            Self::Failed,
            Self::Skipped,
            Self::Cancelled,
            Self::Undefined,
            Self::ProcessingEvents,
            Self::Unavailable,
        ]
        .into_iter()
        .filter(|s| s.is_done())
        .collect()
    }
}

stored_enum! {
    /// Kind of action recorded against resources.
    ResourceActionKind {
        /// A new version was stored.
        Store => "store",
        /// Facts or state were pushed to an agent.
        Push => "push",
        /// An agent pulled resources to deploy.
        Pull => "pull",
        /// Resources were applied.
        Deploy => "deploy",
        /// Changes were computed without applying them.
        Dryrun => "dryrun",
        /// Resource state was captured.
        Snapshot => "snapshot",
        /// Captured state was restored.
        Restore => "restore",
        /// Anything else.
        Other => "other",
    }
}

stored_enum! {
    /// Deployment result of a configuration model version.
    VersionState {
        /// Not deployed yet.
        Pending => "pending",
        /// Deployment in progress.
        Deploying => "deploying",
        /// Every resource deployed.
        Success => "success",
        /// At least one resource failed.
        Failed => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for state in ResourceState::done_states() {
            assert_eq!(ResourceState::from_variant(state.variant()), Some(state));
        }
        assert_eq!(
            ResourceActionKind::from_variant("deploy"),
            Some(ResourceActionKind::Deploy)
        );
        assert_eq!(ResourceActionKind::from_variant("Deploy"), None);
    }

    #[test]
    fn value_carries_enumeration_name() {
        let value = Value::from(ResourceState::Deployed);
        let member = value.as_enum().unwrap();
        assert_eq!(member.enumeration, "ResourceState");
        assert_eq!(member.variant, "deployed");
        assert_eq!(ResourceState::from_value(&value), Some(ResourceState::Deployed));
        assert_eq!(VersionState::from_value(&value), None);
    }

    #[test]
    fn table_lists_every_variant() {
        assert_eq!(ResourceState::TABLE.variants.len(), 9);
        assert_eq!(ResourceActionKind::TABLE.variants.len(), 8);
        assert!(VersionState::TABLE.resolve("success").is_some());
    }

    #[test]
    fn display_uses_stored_name() {
        assert_eq!(ResourceState::ProcessingEvents.to_string(), "processing_events");
        assert_eq!(ResourceActionKind::Dryrun.to_string(), "dryrun");
        assert_eq!(VersionState::Success.to_string(), "success");
    }

    #[test]
    fn done_states() {
        let done = ResourceState::done_states();
        assert!(done.contains(&ResourceState::Deployed));
        assert!(!done.contains(&ResourceState::Available));
        assert!(!done.contains(&ResourceState::Deploying));
    }
}
