//! Table metadata client
//!
//! Interface to the component that owns table configuration and reports
//! per-table readiness. Config updates are compare-and-set on a version
//! number so concurrent writers cannot silently overwrite each other.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use sysdb_common::{AdminError, AdminResult, DatabaseId, Interruptor, NameString, ServerId, TableId};

use crate::view::{SemilatticeView, run_until_satisfied};

/// How far a table has converged
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableReadiness {
    Unavailable,
    OutdatedReads,
    Reads,
    Writes,
    AllReplicasReady,
}

impl TableReadiness {
    pub fn as_str(self) -> &'static str {
        match self {
            TableReadiness::Unavailable => "unavailable",
            TableReadiness::OutdatedReads => "ready_for_outdated_reads",
            TableReadiness::Reads => "ready_for_reads",
            TableReadiness::Writes => "ready_for_writes",
            TableReadiness::AllReplicasReady => "all_replicas_ready",
        }
    }
}

impl std::str::FromStr for TableReadiness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ready_for_outdated_reads" => Ok(TableReadiness::OutdatedReads),
            "ready_for_reads" => Ok(TableReadiness::Reads),
            "ready_for_writes" => Ok(TableReadiness::Writes),
            "all_replicas_ready" => Ok(TableReadiness::AllReplicasReady),
            _ => Err(format!("Unknown readiness `{}`.", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteAcks {
    #[default]
    Majority,
    Single,
}

impl WriteAcks {
    pub fn as_str(self) -> &'static str {
        match self {
            WriteAcks::Majority => "majority",
            WriteAcks::Single => "single",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteDurability {
    #[default]
    Hard,
    Soft,
}

impl WriteDurability {
    pub fn as_str(self) -> &'static str {
        match self {
            WriteDurability::Hard => "hard",
            WriteDurability::Soft => "soft",
        }
    }
}

/// Name, location, and key of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableBasicConfig {
    pub name: NameString,
    pub database: DatabaseId,
    pub primary_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardConfig {
    pub primary_replica: ServerId,
    pub replicas: BTreeSet<ServerId>,
    pub nonvoting_replicas: BTreeSet<ServerId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    pub basic: TableBasicConfig,
    pub shards: Vec<ShardConfig>,
    pub write_acks: WriteAcks,
    pub durability: WriteDurability,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicaState {
    Ready,
    Transitioning,
    Backfilling,
    Disconnected,
    WaitingForPrimary,
    WaitingForQuorum,
}

impl ReplicaState {
    pub fn as_str(self) -> &'static str {
        match self {
            ReplicaState::Ready => "ready",
            ReplicaState::Transitioning => "transitioning",
            ReplicaState::Backfilling => "backfilling",
            ReplicaState::Disconnected => "disconnected",
            ReplicaState::WaitingForPrimary => "waiting_for_primary",
            ReplicaState::WaitingForQuorum => "waiting_for_quorum",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardStatus {
    pub primary_replicas: Vec<ServerId>,
    pub replicas: Vec<(ServerId, ReplicaState)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStatus {
    pub readiness: TableReadiness,
    pub shards: Vec<ShardStatus>,
    pub raft_leader: Option<ServerId>,
}

impl TableStatus {
    /// Status of a table whose replicas have all caught up with its config
    pub fn ready(config: &TableConfig) -> Self {
        Self {
            readiness: TableReadiness::AllReplicasReady,
            shards: config
                .shards
                .iter()
                .map(|shard| ShardStatus {
                    primary_replicas: vec![shard.primary_replica],
                    replicas: shard
                        .replicas
                        .iter()
                        .map(|server| (*server, ReplicaState::Ready))
                        .collect(),
                })
                .collect(),
            raft_leader: config.shards.first().map(|shard| shard.primary_replica),
        }
    }
}

/// Access to table configuration and status
#[async_trait]
pub trait TableMetaClient: Send + Sync {
    /// Basic config of every table in the cluster
    async fn list_tables(&self) -> BTreeMap<TableId, TableBasicConfig>;

    /// Current config and its version
    async fn get_config(
        &self,
        table: TableId,
        interruptor: &Interruptor,
    ) -> AdminResult<(TableConfig, u64)>;

    async fn get_status(&self, table: TableId, interruptor: &Interruptor)
    -> AdminResult<TableStatus>;

    async fn create_table(
        &self,
        table: TableId,
        config: TableConfig,
        interruptor: &Interruptor,
    ) -> AdminResult<()>;

    async fn drop_table(&self, table: TableId, interruptor: &Interruptor) -> AdminResult<()>;

    /// Replace the config if its version is still `expected_version`
    ///
    /// Returns the new version.
    async fn set_config(
        &self,
        table: TableId,
        expected_version: u64,
        config: TableConfig,
        interruptor: &Interruptor,
    ) -> AdminResult<u64>;

    /// Suspend until the table reaches `readiness`
    async fn wait_for_readiness(
        &self,
        table: TableId,
        readiness: TableReadiness,
        interruptor: &Interruptor,
    ) -> AdminResult<()>;
}

#[derive(Debug, Clone)]
struct TableEntry {
    config: TableConfig,
    version: u64,
    status: TableStatus,
}

/// Table metadata held in process, for single-node deployments and tests
#[derive(Clone)]
pub struct InMemoryTableMetaClient {
    tables: Arc<SemilatticeView<BTreeMap<TableId, TableEntry>>>,
}

impl InMemoryTableMetaClient {
    pub fn new() -> Self {
        Self {
            tables: SemilatticeView::shared(BTreeMap::new()),
        }
    }

    /// Report a new status for a table, as a replica would
    pub fn set_status(&self, table: TableId, status: TableStatus) -> bool {
        self.tables.apply(|tables| match tables.get_mut(&table) {
            Some(entry) => {
                entry.status = status;
                true
            }
            None => false,
        })
    }

    fn missing(table: TableId) -> AdminError {
        AdminError::not_found(format!("Table `{}` does not exist.", table))
    }
}

impl Default for InMemoryTableMetaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TableMetaClient for InMemoryTableMetaClient {
    async fn list_tables(&self) -> BTreeMap<TableId, TableBasicConfig> {
        self.tables.read(|tables| {
            tables
                .iter()
                .map(|(id, entry)| (*id, entry.config.basic.clone()))
                .collect()
        })
    }

    async fn get_config(
        &self,
        table: TableId,
        interruptor: &Interruptor,
    ) -> AdminResult<(TableConfig, u64)> {
        interruptor.check()?;
        self.tables.read(|tables| {
            tables
                .get(&table)
                .map(|entry| (entry.config.clone(), entry.version))
                .ok_or_else(|| Self::missing(table))
        })
    }

    async fn get_status(
        &self,
        table: TableId,
        interruptor: &Interruptor,
    ) -> AdminResult<TableStatus> {
        interruptor.check()?;
        self.tables.read(|tables| {
            tables
                .get(&table)
                .map(|entry| entry.status.clone())
                .ok_or_else(|| Self::missing(table))
        })
    }

    async fn create_table(
        &self,
        table: TableId,
        config: TableConfig,
        interruptor: &Interruptor,
    ) -> AdminResult<()> {
        interruptor.check()?;
        self.tables.try_apply(|tables| {
            let collision = tables.values().any(|entry| {
                entry.config.basic.database == config.basic.database
                    && entry.config.basic.name == config.basic.name
            });
            if collision || tables.contains_key(&table) {
                return Err(AdminError::forwarded(format!(
                    "Table `{}` already exists.",
                    config.basic.name
                )));
            }
            let status = TableStatus::ready(&config);
            tables.insert(
                table,
                TableEntry {
                    config,
                    version: 1,
                    status,
                },
            );
            Ok(())
        })
    }

    async fn drop_table(&self, table: TableId, interruptor: &Interruptor) -> AdminResult<()> {
        interruptor.check()?;
        self.tables.try_apply(|tables| {
            tables
                .remove(&table)
                .map(|_| ())
                .ok_or_else(|| Self::missing(table))
        })
    }

    async fn set_config(
        &self,
        table: TableId,
        expected_version: u64,
        config: TableConfig,
        interruptor: &Interruptor,
    ) -> AdminResult<u64> {
        interruptor.check()?;
        self.tables.try_apply(|tables| {
            let entry = tables.get_mut(&table).ok_or_else(|| Self::missing(table))?;
            if entry.version != expected_version {
                return Err(AdminError::forwarded(format!(
                    "The configuration of table `{}` was changed concurrently; try again.",
                    entry.config.basic.name
                )));
            }
            entry.status = TableStatus::ready(&config);
            entry.config = config;
            entry.version += 1;
            Ok(entry.version)
        })
    }

    async fn wait_for_readiness(
        &self,
        table: TableId,
        readiness: TableReadiness,
        interruptor: &Interruptor,
    ) -> AdminResult<()> {
        let mut missing = false;
        run_until_satisfied(
            self.tables.as_ref(),
            |tables: &BTreeMap<TableId, TableEntry>| match tables.get(&table) {
                Some(entry) => entry.status.readiness >= readiness,
                None => {
                    missing = true;
                    true
                }
            },
            interruptor,
        )
        .await?;
        if missing {
            Err(Self::missing(table))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use sysdb_common::AdminErrorKind;

    fn config(name: &str, server: ServerId) -> TableConfig {
        TableConfig {
            basic: TableBasicConfig {
                name: NameString::new(name).unwrap(),
                database: DatabaseId::new(),
                primary_key: "id".to_string(),
            },
            shards: vec![ShardConfig {
                primary_replica: server,
                replicas: [server].into_iter().collect(),
                nonvoting_replicas: BTreeSet::new(),
            }],
            write_acks: WriteAcks::Majority,
            durability: WriteDurability::Hard,
        }
    }

    #[test]
    fn test_readiness_order_and_parse() {
        assert!(TableReadiness::AllReplicasReady > TableReadiness::Writes);
        assert!(TableReadiness::Writes > TableReadiness::Reads);
        assert!(TableReadiness::Reads > TableReadiness::OutdatedReads);
        assert_eq!(
            "ready_for_writes".parse::<TableReadiness>().unwrap(),
            TableReadiness::Writes
        );
        assert!("ready".parse::<TableReadiness>().is_err());
    }

    #[tokio::test]
    async fn test_create_and_compare_and_set() {
        let client = InMemoryTableMetaClient::new();
        let interruptor = Interruptor::new();
        let table = TableId::new();
        let server = ServerId::new();
        client
            .create_table(table, config("orders", server), &interruptor)
            .await
            .unwrap();

        let (mut current, version) = client.get_config(table, &interruptor).await.unwrap();
        assert_eq!(version, 1);
        current.write_acks = WriteAcks::Single;
        let new_version = client
            .set_config(table, version, current.clone(), &interruptor)
            .await
            .unwrap();
        assert_eq!(new_version, 2);

        let err = client
            .set_config(table, version, current, &interruptor)
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdminErrorKind::Forwarded);
    }

    #[tokio::test]
    async fn test_missing_table() {
        let client = InMemoryTableMetaClient::new();
        let err = client
            .get_status(TableId::new(), &Interruptor::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdminErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_wait_for_readiness() {
        let client = InMemoryTableMetaClient::new();
        let interruptor = Interruptor::new();
        let table = TableId::new();
        let server = ServerId::new();
        let cfg = config("orders", server);
        client.create_table(table, cfg.clone(), &interruptor).await.unwrap();
        client.set_status(
            table,
            TableStatus {
                readiness: TableReadiness::OutdatedReads,
                ..TableStatus::ready(&cfg)
            },
        );

        let writer = client.clone();
        let ready = TableStatus::ready(&cfg);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            writer.set_status(table, ready);
        });
        client
            .wait_for_readiness(table, TableReadiness::Writes, &interruptor)
            .await
            .unwrap();
    }
}
