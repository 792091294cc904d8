//! `rethinkdb._debug_stats`: unaggregated stats of every connected server

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use sysdb_common::{AdminError, AdminResult, Datum, OperationContext, PeerId};
use sysdb_metadata::{ClusterDirectoryMetadata, MailboxManager, WatchableMap};

use crate::backend::{ArtificialTableBackend, SystemTableKind, read_only};
use crate::stats::gather_peer_stats;

pub struct DebugStatsBackend {
    directory: Arc<WatchableMap<PeerId, ClusterDirectoryMetadata>>,
    mailbox: Arc<dyn MailboxManager>,
}

impl DebugStatsBackend {
    pub fn new(
        directory: Arc<WatchableMap<PeerId, ClusterDirectoryMetadata>>,
        mailbox: Arc<dyn MailboxManager>,
    ) -> Self {
        Self { directory, mailbox }
    }
}

#[async_trait]
impl ArtificialTableBackend for DebugStatsBackend {
    async fn read_all_rows(&self, ctx: &OperationContext) -> AdminResult<Vec<Datum>> {
        ctx.check_interrupted()?;
        let directory = self.directory.snapshot();
        let stats = gather_peer_stats(&directory, self.mailbox.as_ref(), ctx).await?;
        stats
            .into_iter()
            .map(|(server, stats)| {
                let stats = serde_json::to_value(&stats)
                    .map_err(|e| AdminError::invalid(format!("Unrenderable stats: {}", e)))?;
                Ok(json!({"id": server.to_string(), "stats": stats}))
            })
            .collect()
    }

    async fn write_row(
        &self,
        _ctx: &OperationContext,
        _pkey: &Datum,
        _new_value: Option<Datum>,
    ) -> AdminResult<()> {
        Err(read_only(SystemTableKind::DebugStats.name()))
    }
}
