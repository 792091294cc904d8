//! `rethinkdb._debug_table_status`: raw per-table configuration and status

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use sysdb_common::{AdminError, AdminErrorKind, AdminResult, Datum, OperationContext};
use sysdb_metadata::{NamespaceRepo, TableMetaClient};

use crate::backend::{ArtificialTableBackend, SystemTableKind, read_only};

pub struct DebugTableStatusBackend {
    table_meta: Arc<dyn TableMetaClient>,
    namespace_repo: Arc<dyn NamespaceRepo>,
}

impl DebugTableStatusBackend {
    pub fn new(
        table_meta: Arc<dyn TableMetaClient>,
        namespace_repo: Arc<dyn NamespaceRepo>,
    ) -> Self {
        Self {
            table_meta,
            namespace_repo,
        }
    }
}

fn to_datum<T: serde::Serialize>(value: &T) -> AdminResult<Datum> {
    serde_json::to_value(value)
        .map_err(|e| AdminError::invalid(format!("Unrenderable table metadata: {}", e)))
}

#[async_trait]
impl ArtificialTableBackend for DebugTableStatusBackend {
    async fn read_all_rows(&self, ctx: &OperationContext) -> AdminResult<Vec<Datum>> {
        ctx.check_interrupted()?;
        let mut rows = Vec::new();
        for (table, basic) in self.table_meta.list_tables().await {
            let config = self.table_meta.get_config(table, &ctx.interruptor).await;
            let status = self.table_meta.get_status(table, &ctx.interruptor).await;
            let ((config, version), status) = match (config, status) {
                (Ok(config), Ok(status)) => (config, status),
                (Err(e), _) | (_, Err(e)) if e.is(AdminErrorKind::NotFound) => continue,
                (Err(e), _) | (_, Err(e)) => return Err(e),
            };
            let doc_counts = match self
                .namespace_repo
                .shard_doc_counts(table, &ctx.interruptor)
                .await
            {
                Ok(counts) => counts,
                Err(e) if e.is(AdminErrorKind::NotFound) => continue,
                Err(e) => return Err(e),
            };
            rows.push(json!({
                "id": table.to_string(),
                "name": basic.name.as_str(),
                "db": basic.database.to_string(),
                "config_version": version,
                "config": to_datum(&config)?,
                "readiness": status.readiness.as_str(),
                "status": to_datum(&status)?,
                "shard_doc_counts": doc_counts,
            }));
        }
        Ok(rows)
    }

    async fn write_row(
        &self,
        _ctx: &OperationContext,
        _pkey: &Datum,
        _new_value: Option<Datum>,
    ) -> AdminResult<()> {
        Err(read_only(SystemTableKind::DebugTableStatus.name()))
    }
}
