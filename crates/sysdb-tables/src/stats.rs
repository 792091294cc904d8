//! `rethinkdb.stats`
//!
//! Live counters gathered from every connected server and aggregated per
//! cluster, server, table and table replica.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use sysdb_common::{
    AdminErrorKind, AdminResult, Datum, IdentifierFormat, OperationContext, PeerId, ServerId,
    TableId,
};
use sysdb_metadata::{
    ClusterDirectoryMetadata, ClusterMetadata, MailboxManager, PeerStats, SemilatticeView,
    ServerConfigClient, TableMetaClient, WatchableMap,
};

use crate::backend::{ArtificialTableBackend, SystemTableKind, read_only};
use crate::render::{IdentityRenderer, directory_server_names};

pub struct StatsBackend {
    format: IdentifierFormat,
    directory: Arc<WatchableMap<PeerId, ClusterDirectoryMetadata>>,
    cluster_view: Arc<SemilatticeView<ClusterMetadata>>,
    table_meta: Arc<dyn TableMetaClient>,
    server_config: Arc<dyn ServerConfigClient>,
    mailbox: Arc<dyn MailboxManager>,
}

impl StatsBackend {
    pub fn new(
        format: IdentifierFormat,
        directory: Arc<WatchableMap<PeerId, ClusterDirectoryMetadata>>,
        cluster_view: Arc<SemilatticeView<ClusterMetadata>>,
        table_meta: Arc<dyn TableMetaClient>,
        server_config: Arc<dyn ServerConfigClient>,
        mailbox: Arc<dyn MailboxManager>,
    ) -> Self {
        Self {
            format,
            directory,
            cluster_view,
            table_meta,
            server_config,
            mailbox,
        }
    }
}

/// Fetch stats from every connected peer, skipping peers that do not answer
pub(crate) async fn gather_peer_stats(
    directory: &BTreeMap<PeerId, ClusterDirectoryMetadata>,
    mailbox: &dyn MailboxManager,
    ctx: &OperationContext,
) -> AdminResult<BTreeMap<ServerId, PeerStats>> {
    let mut stats = BTreeMap::new();
    for (peer, metadata) in directory {
        match mailbox.fetch_stats(*peer, &ctx.interruptor).await {
            Ok(peer_stats) => {
                stats.insert(metadata.server_id, peer_stats);
            }
            Err(e) if e.is(AdminErrorKind::Interrupted) => return Err(e),
            Err(e) => tracing::warn!(%peer, error = %e, "failed to fetch stats"),
        }
    }
    Ok(stats)
}

fn stats_rows(
    stats: &BTreeMap<ServerId, PeerStats>,
    tables: &BTreeMap<TableId, sysdb_metadata::TableBasicConfig>,
    renderer: &IdentityRenderer,
) -> Vec<Datum> {
    let mut rows = Vec::new();

    let (mut qps, mut reads, mut writes, mut clients) = (0.0, 0.0, 0.0, 0u64);
    for peer in stats.values() {
        qps += peer.query_engine.queries_per_sec;
        reads += peer.query_engine.read_docs_per_sec;
        writes += peer.query_engine.written_docs_per_sec;
        clients += peer.query_engine.client_connections;
    }
    rows.push(json!({
        "id": ["cluster"],
        "query_engine": {
            "queries_per_sec": qps,
            "read_docs_per_sec": reads,
            "written_docs_per_sec": writes,
            "client_connections": clients,
        },
    }));

    for (server, peer) in stats {
        let server = renderer.server(server);
        let q = &peer.query_engine;
        rows.push(json!({
            "id": ["server", server],
            "server": server,
            "query_engine": {
                "queries_per_sec": q.queries_per_sec,
                "queries_total": q.queries_total,
                "read_docs_per_sec": q.read_docs_per_sec,
                "read_docs_total": q.read_docs_total,
                "written_docs_per_sec": q.written_docs_per_sec,
                "written_docs_total": q.written_docs_total,
                "client_connections": q.client_connections,
            },
        }));
    }

    for (table, basic) in tables {
        let (mut reads, mut writes) = (0.0, 0.0);
        for peer in stats.values() {
            if let Some(t) = peer.tables.get(table) {
                reads += t.read_docs_per_sec;
                writes += t.written_docs_per_sec;
            }
        }
        let table_ref = renderer.table(table);
        rows.push(json!({
            "id": ["table", table_ref],
            "table": table_ref,
            "db": renderer.database(&basic.database),
            "query_engine": {
                "read_docs_per_sec": reads,
                "written_docs_per_sec": writes,
            },
        }));
    }

    for (server, peer) in stats {
        let server = renderer.server(server);
        for (table, t) in &peer.tables {
            // Counters for tables dropped since the peer reported them
            let Some(basic) = tables.get(table) else {
                continue;
            };
            let table_ref = renderer.table(table);
            rows.push(json!({
                "id": ["table_server", table_ref, server],
                "table": table_ref,
                "db": renderer.database(&basic.database),
                "server": server,
                "query_engine": {
                    "read_docs_per_sec": t.read_docs_per_sec,
                    "read_docs_total": t.read_docs_total,
                    "written_docs_per_sec": t.written_docs_per_sec,
                    "written_docs_total": t.written_docs_total,
                },
                "storage_engine": {
                    "cache": {"in_use_bytes": t.cache_in_use_bytes},
                    "disk": {"space_usage": {"data_bytes": t.disk_space_used_bytes}},
                },
            }));
        }
    }

    rows
}

#[async_trait]
impl ArtificialTableBackend for StatsBackend {
    async fn read_all_rows(&self, ctx: &OperationContext) -> AdminResult<Vec<Datum>> {
        ctx.check_interrupted()?;
        let directory = self.directory.snapshot();
        let tables = self.table_meta.list_tables().await;
        let renderer = self
            .cluster_view
            .read(|cluster| IdentityRenderer::new(self.format).with_databases(cluster))
            .with_tables(&tables)
            .with_servers(directory_server_names(&directory))
            .with_servers(self.server_config.server_names());
        let stats = gather_peer_stats(&directory, self.mailbox.as_ref(), ctx).await?;
        Ok(stats_rows(&stats, &tables, &renderer))
    }

    async fn write_row(
        &self,
        _ctx: &OperationContext,
        _pkey: &Datum,
        _new_value: Option<Datum>,
    ) -> AdminResult<()> {
        Err(read_only(SystemTableKind::Stats.name()))
    }
}
