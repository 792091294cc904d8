//! Verb parameters passed through to the real cluster interface

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// How a table's shards and replicas should be laid out across server tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableGenerateConfigParams {
    pub shards: usize,
    /// Replica count per server tag
    pub replicas: BTreeMap<String, usize>,
    pub nonvoting_replica_tags: BTreeSet<String>,
    pub primary_replica_tag: String,
}

impl Default for TableGenerateConfigParams {
    fn default() -> Self {
        Self {
            shards: 1,
            replicas: [("default".to_string(), 1)].into_iter().collect(),
            nonvoting_replica_tags: BTreeSet::new(),
            primary_replica_tag: "default".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyRepairMode {
    /// Drop replicas that are gone for good, keeping data only where a quorum survived
    UnsafeRollback,
    /// Like `UnsafeRollback`, erasing shards with no surviving replica
    UnsafeRollbackOrErase,
}

/// Definition of a secondary index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SindexConfig {
    /// Serialized mapping function
    pub function: String,
    pub multi: bool,
    pub geo: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SindexStatus {
    pub ready: bool,
    /// Construction progress in `[0, 1]` while the index is being built
    pub progress: Option<f64>,
    pub outdated: bool,
}

/// Write hook attached to a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierConfig {
    /// Serialized hook function
    pub function: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let params = TableGenerateConfigParams::default();
        assert_eq!(params.shards, 1);
        assert_eq!(params.replicas.get("default"), Some(&1));
        assert_eq!(params.primary_replica_tag, "default");
    }

    #[test]
    fn test_repair_mode_names() {
        assert_eq!(
            serde_json::to_value(EmergencyRepairMode::UnsafeRollbackOrErase).unwrap(),
            serde_json::json!("unsafe_rollback_or_erase")
        );
    }
}
