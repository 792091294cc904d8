//! Per-peer directory state
//!
//! Every connected peer publishes a `ClusterDirectoryMetadata` describing the
//! server it runs: identity, network endpoints, process details, and the jobs
//! it is currently executing.

use std::collections::{BTreeMap, BTreeSet};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::sync::futures::Notified;
use uuid::Uuid;

use sysdb_common::{NameString, PeerId, ServerId, TableId, Username};

use crate::view::Watchable;

/// Details of one job running on a server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobInfo {
    Query {
        client_address: String,
        client_port: u16,
        query: String,
        user: Option<Username>,
    },
    IndexConstruction {
        table: TableId,
        index: String,
        progress: f64,
    },
    Backfill {
        table: TableId,
        source_server: ServerId,
        destination_server: ServerId,
        progress: f64,
    },
    DiskCompaction,
}

impl JobInfo {
    pub fn type_name(&self) -> &'static str {
        match self {
            JobInfo::Query { .. } => "query",
            JobInfo::IndexConstruction { .. } => "index_construction",
            JobInfo::Backfill { .. } => "backfill",
            JobInfo::DiskCompaction => "disk_compaction",
        }
    }
}

/// A job as reported by one server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub id: Uuid,
    pub duration_ms: u64,
    pub info: JobInfo,
}

/// What a peer publishes about itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterDirectoryMetadata {
    pub server_id: ServerId,
    pub peer_id: PeerId,
    pub server_name: NameString,
    pub hostname: String,
    pub cluster_port: u16,
    pub reql_port: u16,
    pub http_admin_port: Option<u16>,
    pub pid: u32,
    pub version: String,
    pub time_started: DateTime<Utc>,
    pub time_connected: DateTime<Utc>,
    pub cache_size_mb: f64,
    pub connected_to: BTreeSet<ServerId>,
    pub jobs: Vec<JobReport>,
}

impl ClusterDirectoryMetadata {
    /// A freshly started server with no connections and no jobs
    pub fn new(server_id: ServerId, peer_id: PeerId, server_name: NameString) -> Self {
        let now = Utc::now();
        Self {
            server_id,
            peer_id,
            server_name,
            hostname: "localhost".to_string(),
            cluster_port: 29015,
            reql_port: 28015,
            http_admin_port: Some(8080),
            pid: std::process::id(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            time_started: now,
            time_connected: now,
            cache_size_mb: 512.0,
            connected_to: BTreeSet::new(),
            jobs: Vec::new(),
        }
    }
}

pub type DirectorySnapshot = BTreeMap<PeerId, ClusterDirectoryMetadata>;

/// Concurrent keyed map with change notification
pub struct WatchableMap<K, V> {
    entries: DashMap<K, V>,
    version: AtomicU64,
    notify: Notify,
}

impl<K, V> WatchableMap<K, V>
where
    K: Eq + Hash + Ord + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            version: AtomicU64::new(0),
            notify: Notify::new(),
        }
    }

    pub fn get_key(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    pub fn set_key(&self, key: K, value: V) {
        self.entries.insert(key, value);
        self.bump();
    }

    pub fn delete_key(&self, key: &K) -> Option<V> {
        let removed = self.entries.remove(key).map(|(_, v)| v);
        if removed.is_some() {
            self.bump();
        }
        removed
    }

    /// Mutate one entry in place; returns false if the key is absent
    pub fn update_key(&self, key: &K, f: impl FnOnce(&mut V)) -> bool {
        let updated = match self.entries.get_mut(key) {
            Some(mut entry) => {
                f(entry.value_mut());
                true
            }
            None => false,
        };
        if updated {
            self.bump();
        }
        updated
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn snapshot(&self) -> BTreeMap<K, V> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    fn bump(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
        self.notify.notify_waiters();
    }
}

impl<K, V> Default for WatchableMap<K, V>
where
    K: Eq + Hash + Ord + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Watchable<BTreeMap<K, V>> for WatchableMap<K, V>
where
    K: Eq + Hash + Ord + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self) -> BTreeMap<K, V> {
        self.snapshot()
    }

    fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    fn notified(&self) -> Notified<'_> {
        self.notify.notified()
    }
}

/// Directory entries indexed by server rather than peer
pub fn by_server(snapshot: &DirectorySnapshot) -> BTreeMap<ServerId, &ClusterDirectoryMetadata> {
    snapshot
        .values()
        .map(|metadata| (metadata.server_id, metadata))
        .collect()
}
