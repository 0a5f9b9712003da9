//! Scheduler configuration

use crate::error::{SchedulerError, SchedulerResult};
use proclock_primitives::TableName;
use serde::{Deserialize, Serialize};

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Queue fresh requests behind existing waiters even when the current
    /// holders would admit them
    #[serde(default)]
    pub fair_admission: bool,
    /// Table an exclusive namespace lock holds a shared lock on
    #[serde(default = "default_system_namespace_table")]
    pub system_namespace_table: String,
    /// Record lock metrics
    #[serde(default = "default_metrics")]
    pub metrics: bool,
}

fn default_system_namespace_table() -> String {
    TableName::namespace_table().to_string()
}

fn default_metrics() -> bool {
    true
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            fair_admission: false,
            system_namespace_table: default_system_namespace_table(),
            metrics: default_metrics(),
        }
    }
}

impl SchedulerConfig {
    /// Parse from TOML
    pub fn from_toml(content: &str) -> SchedulerResult<Self> {
        toml::from_str(content).map_err(|e| SchedulerError::Config(e.to_string()))
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> SchedulerResult<String> {
        toml::to_string_pretty(self).map_err(|e| SchedulerError::Config(e.to_string()))
    }

    /// Parsed system namespace table
    pub fn system_table(&self) -> SchedulerResult<TableName> {
        TableName::parse(&self.system_namespace_table).map_err(|e| {
            SchedulerError::Config(format!(
                "system_namespace_table {:?}: {}",
                self.system_namespace_table, e
            ))
        })
    }
}
