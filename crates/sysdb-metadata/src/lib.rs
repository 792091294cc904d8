//! Cluster metadata consumed by the system tables
//!
//! Replicated metadata is exposed through versioned views that support waiting
//! for change. Services owned by other subsystems (table configuration, server
//! configuration, document counts, peer mailboxes) are reached through traits,
//! each with an in-process implementation.

pub mod directory;
pub mod mailbox;
pub mod model;
pub mod namespace_repo;
pub mod server_config;
pub mod table_meta;
pub mod view;

pub use directory::{
    ClusterDirectoryMetadata, DirectorySnapshot, JobInfo, JobReport, WatchableMap, by_server,
};
pub use mailbox::{
    InMemoryMailboxManager, LogLevel, LogLine, MailboxManager, PeerStats, QueryEngineStats,
    TableServerStats,
};
pub use model::{ClusterMetadata, DatabaseConfig, HeartbeatMetadata};
pub use namespace_repo::{InMemoryNamespaceRepo, NamespaceRepo};
pub use server_config::{InMemoryServerConfigClient, ServerConfig, ServerConfigClient};
pub use sysdb_common::AuthMetadata;
pub use table_meta::{
    InMemoryTableMetaClient, ReplicaState, ShardConfig, ShardStatus, TableBasicConfig,
    TableConfig, TableMetaClient, TableReadiness, TableStatus, WriteAcks, WriteDurability,
};
pub use view::{SemilatticeView, Watchable, run_until_satisfied, wait_for_change};
