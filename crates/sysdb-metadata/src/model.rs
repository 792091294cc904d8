//! Cluster-wide metadata propagated to every server

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use sysdb_common::{DatabaseId, NameString};

/// Configuration of one user database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub name: NameString,
}

/// Databases known to the cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMetadata {
    pub databases: BTreeMap<DatabaseId, DatabaseConfig>,
}

impl ClusterMetadata {
    /// Every database currently carrying `name`; more than one is a name collision
    pub fn databases_named(&self, name: &NameString) -> Vec<DatabaseId> {
        self.databases
            .iter()
            .filter(|(_, config)| &config.name == name)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn database_name(&self, id: &DatabaseId) -> Option<&NameString> {
        self.databases.get(id).map(|config| &config.name)
    }
}

/// Default heartbeat timeout between peers
pub const DEFAULT_HEARTBEAT_TIMEOUT_MS: u64 = 10_000;

/// Peer liveness settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatMetadata {
    pub heartbeat_timeout_ms: u64,
}

impl Default for HeartbeatMetadata {
    fn default() -> Self {
        Self {
            heartbeat_timeout_ms: DEFAULT_HEARTBEAT_TIMEOUT_MS,
        }
    }
}
