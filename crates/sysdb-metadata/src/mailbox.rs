//! Request/response exchanges with individual peers
//!
//! Logs, live statistics and job interruption are not part of the replicated
//! metadata; they are fetched from (or sent to) the peer that owns them.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sysdb_common::{AdminError, AdminResult, Interruptor, PeerId, TableId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Notice => "notice",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// One line of a server's log file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub uptime_secs: f64,
    pub level: LogLevel,
    pub message: String,
}

/// Query engine counters of one server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryEngineStats {
    pub queries_per_sec: f64,
    pub queries_total: u64,
    pub read_docs_per_sec: f64,
    pub read_docs_total: u64,
    pub written_docs_per_sec: f64,
    pub written_docs_total: u64,
    pub client_connections: u64,
}

/// Storage counters of one table replica on one server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableServerStats {
    pub read_docs_per_sec: f64,
    pub read_docs_total: u64,
    pub written_docs_per_sec: f64,
    pub written_docs_total: u64,
    pub cache_in_use_bytes: u64,
    pub disk_space_used_bytes: u64,
}

/// Everything a peer reports when asked for statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerStats {
    pub query_engine: QueryEngineStats,
    pub tables: BTreeMap<TableId, TableServerStats>,
}

/// Point-to-point requests addressed to a single peer
#[async_trait]
pub trait MailboxManager: Send + Sync {
    /// The most recent `max_lines` log lines of the peer, oldest first
    async fn fetch_logs(
        &self,
        peer: PeerId,
        max_lines: usize,
        interruptor: &Interruptor,
    ) -> AdminResult<Vec<LogLine>>;

    async fn fetch_stats(&self, peer: PeerId, interruptor: &Interruptor)
    -> AdminResult<PeerStats>;

    /// Ask the peer to interrupt a running query
    async fn interrupt_job(
        &self,
        peer: PeerId,
        job: Uuid,
        interruptor: &Interruptor,
    ) -> AdminResult<()>;
}

/// Peers simulated in process
#[derive(Default)]
pub struct InMemoryMailboxManager {
    logs: DashMap<PeerId, Vec<LogLine>>,
    stats: DashMap<PeerId, PeerStats>,
    interrupted: DashMap<Uuid, PeerId>,
}

impl InMemoryMailboxManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_log(&self, peer: PeerId, line: LogLine) {
        self.logs.entry(peer).or_default().push(line);
    }

    pub fn set_stats(&self, peer: PeerId, stats: PeerStats) {
        self.stats.insert(peer, stats);
    }

    /// Whether `interrupt_job` reached the peer for `job`
    pub fn was_interrupted(&self, job: &Uuid) -> bool {
        self.interrupted.contains_key(job)
    }

    fn unreachable(peer: PeerId) -> AdminError {
        AdminError::forwarded(format!("Peer `{}` is not reachable.", peer))
    }
}

#[async_trait]
impl MailboxManager for InMemoryMailboxManager {
    async fn fetch_logs(
        &self,
        peer: PeerId,
        max_lines: usize,
        interruptor: &Interruptor,
    ) -> AdminResult<Vec<LogLine>> {
        interruptor.check()?;
        let lines = self
            .logs
            .get(&peer)
            .map(|l| l.value().clone())
            .unwrap_or_default();
        let skip = lines.len().saturating_sub(max_lines);
        Ok(lines.into_iter().skip(skip).collect())
    }

    async fn fetch_stats(
        &self,
        peer: PeerId,
        interruptor: &Interruptor,
    ) -> AdminResult<PeerStats> {
        interruptor.check()?;
        self.stats
            .get(&peer)
            .map(|s| s.value().clone())
            .ok_or_else(|| Self::unreachable(peer))
    }

    async fn interrupt_job(
        &self,
        peer: PeerId,
        job: Uuid,
        interruptor: &Interruptor,
    ) -> AdminResult<()> {
        interruptor.check()?;
        tracing::debug!(%peer, %job, "interrupting job");
        self.interrupted.insert(job, peer);
        Ok(())
    }
}
