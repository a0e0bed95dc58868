//! Data layer configuration.

use serde::Deserialize;

/// Tunables for the lifecycle queries.
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// Number of newest configuration models kept when pruning.
    #[serde(default = "DataConfig::default_versions_to_keep")]
    pub versions_to_keep: usize,

    /// Number of actions returned by a log query without an explicit limit.
    #[serde(default = "DataConfig::default_log_limit")]
    pub log_limit: usize,
}

impl DataConfig {
    const fn default_versions_to_keep() -> usize {
        2
    }

    const fn default_log_limit() -> usize {
        100
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            versions_to_keep: Self::default_versions_to_keep(),
            log_limit: Self::default_log_limit(),
        }
    }
}
