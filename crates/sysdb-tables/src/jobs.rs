//! `rethinkdb.jobs`
//!
//! Jobs currently running anywhere in the cluster, merged across the servers
//! that report them. Deleting a `query` job interrupts it on its server.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use uuid::Uuid;

use sysdb_common::{
    AdminError, AdminResult, Datum, IdentifierFormat, OperationContext, PeerId, ServerId,
    TableId,
};
use sysdb_metadata::{
    ClusterDirectoryMetadata, ClusterMetadata, JobInfo, MailboxManager, SemilatticeView,
    ServerConfigClient, TableMetaClient, WatchableMap,
};

use crate::backend::{ArtificialTableBackend, SystemTableKind, WritePolicy};
use crate::datum::{expect_str, expect_uuid};
use crate::render::{IdentityRenderer, directory_server_names};

pub struct JobsBackend {
    format: IdentifierFormat,
    directory: Arc<WatchableMap<PeerId, ClusterDirectoryMetadata>>,
    cluster_view: Arc<SemilatticeView<ClusterMetadata>>,
    table_meta: Arc<dyn TableMetaClient>,
    server_config: Arc<dyn ServerConfigClient>,
    mailbox: Arc<dyn MailboxManager>,
}

/// One job as seen across every server running it
struct MergedJob {
    info: JobInfo,
    duration_ms: u64,
    servers: Vec<ServerId>,
    peers: Vec<PeerId>,
}

fn merge_jobs(
    directory: &BTreeMap<PeerId, ClusterDirectoryMetadata>,
) -> BTreeMap<(&'static str, Uuid), MergedJob> {
    let mut jobs: BTreeMap<(&'static str, Uuid), MergedJob> = BTreeMap::new();
    for (peer, metadata) in directory {
        for report in &metadata.jobs {
            let job = jobs
                .entry((report.info.type_name(), report.id))
                .or_insert_with(|| MergedJob {
                    info: report.info.clone(),
                    duration_ms: 0,
                    servers: Vec::new(),
                    peers: Vec::new(),
                });
            job.duration_ms = job.duration_ms.max(report.duration_ms);
            job.servers.push(metadata.server_id);
            job.peers.push(*peer);
        }
    }
    jobs
}

fn render_info(info: &JobInfo, renderer: &IdentityRenderer) -> Datum {
    let db_of = |table: &TableId| {
        renderer
            .table_database(table)
            .map(|db| renderer.database(&db))
            .unwrap_or(Value::Null)
    };
    match info {
        JobInfo::Query {
            client_address,
            client_port,
            query,
            user,
        } => json!({
            "client_address": client_address,
            "client_port": client_port,
            "query": query,
            "user": user.as_ref().map(|u| u.as_str()),
        }),
        JobInfo::IndexConstruction {
            table,
            index,
            progress,
        } => json!({
            "db": db_of(table),
            "table": renderer.table(table),
            "index": index,
            "progress": progress,
        }),
        JobInfo::Backfill {
            table,
            source_server,
            destination_server,
            progress,
        } => json!({
            "db": db_of(table),
            "table": renderer.table(table),
            "source_server": renderer.server(source_server),
            "destination_server": renderer.server(destination_server),
            "progress": progress,
        }),
        JobInfo::DiskCompaction => json!({}),
    }
}

impl JobsBackend {
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

    fn parse_key(pkey: &Datum) -> AdminResult<(String, Uuid)> {
        match pkey.as_array().map(Vec::as_slice) {
            Some([kind, id]) => Ok((expect_str(kind, "type")?.to_string(), expect_uuid(id, "id")?)),
            _ => Err(AdminError::invalid(format!(
                "Expected a `[type, id]` pair as the primary key, got {}.",
                pkey
            ))),
        }
    }
}

#[async_trait]
impl ArtificialTableBackend for JobsBackend {
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

        Ok(merge_jobs(&directory)
            .into_iter()
            .map(|((kind, id), job)| {
                json!({
                    "id": [kind, id.to_string()],
                    "type": kind,
                    "duration_sec": job.duration_ms as f64 / 1000.0,
                    "servers": job.servers.iter().map(|s| renderer.server(s)).collect::<Vec<_>>(),
                    "info": render_info(&job.info, &renderer),
                })
            })
            .collect())
    }

    async fn write_row(
        &self,
        ctx: &OperationContext,
        pkey: &Datum,
        new_value: Option<Datum>,
    ) -> AdminResult<()> {
        ctx.check_interrupted()?;
        let (kind, id) = Self::parse_key(pkey)?;
        let directory = self.directory.snapshot();
        let jobs = merge_jobs(&directory);
        let job = jobs.iter().find(|((k, i), _)| *k == kind && *i == id);

        WritePolicy::DeleteOnly.check(
            SystemTableKind::Jobs.name(),
            job.is_some(),
            new_value.as_ref(),
        )?;
        let Some((_, job)) = job else {
            return Ok(());
        };
        if !matches!(job.info, JobInfo::Query { .. }) {
            return Err(AdminError::invalid(format!(
                "Only `query` jobs can be interrupted; `{}` jobs cannot.",
                kind
            )));
        }
        for peer in &job.peers {
            self.mailbox
                .interrupt_job(*peer, id, &ctx.interruptor)
                .await?;
        }
        tracing::info!(job = %id, "interrupted query job");
        Ok(())
    }
}
