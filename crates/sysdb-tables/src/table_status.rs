//! `rethinkdb.table_status`

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use sysdb_common::{
    AdminErrorKind, AdminResult, Datum, IdentifierFormat, OperationContext, TableId,
};
use sysdb_metadata::{
    ClusterMetadata, SemilatticeView, ServerConfigClient, TableBasicConfig, TableMetaClient,
    TableReadiness, TableStatus,
};

use crate::backend::{ArtificialTableBackend, SystemTableKind, read_only};
use crate::render::IdentityRenderer;

pub struct TableStatusBackend {
    format: IdentifierFormat,
    cluster_view: Arc<SemilatticeView<ClusterMetadata>>,
    table_meta: Arc<dyn TableMetaClient>,
    server_config: Arc<dyn ServerConfigClient>,
}

impl TableStatusBackend {
    pub fn new(
        format: IdentifierFormat,
        cluster_view: Arc<SemilatticeView<ClusterMetadata>>,
        table_meta: Arc<dyn TableMetaClient>,
        server_config: Arc<dyn ServerConfigClient>,
    ) -> Self {
        Self {
            format,
            cluster_view,
            table_meta,
            server_config,
        }
    }
}

fn row(
    table: &TableId,
    basic: &TableBasicConfig,
    status: &TableStatus,
    renderer: &IdentityRenderer,
) -> Datum {
    let shards: Vec<Datum> = status
        .shards
        .iter()
        .map(|shard| {
            json!({
                "primary_replicas": shard
                    .primary_replicas
                    .iter()
                    .map(|s| renderer.server(s))
                    .collect::<Vec<_>>(),
                "replicas": shard
                    .replicas
                    .iter()
                    .map(|(server, state)| json!({
                        "server": renderer.server(server),
                        "state": state.as_str(),
                    }))
                    .collect::<Vec<_>>(),
            })
        })
        .collect();
    let ready = |level: TableReadiness| status.readiness >= level;
    json!({
        "id": table.to_string(),
        "name": basic.name.as_str(),
        "db": renderer.database(&basic.database),
        "status": {
            "ready_for_outdated_reads": ready(TableReadiness::OutdatedReads),
            "ready_for_reads": ready(TableReadiness::Reads),
            "ready_for_writes": ready(TableReadiness::Writes),
            "all_replicas_ready": ready(TableReadiness::AllReplicasReady),
        },
        "shards": shards,
        "raft_leader": status
            .raft_leader
            .map(|leader| renderer.server(&leader))
            .unwrap_or(Value::Null),
    })
}

#[async_trait]
impl ArtificialTableBackend for TableStatusBackend {
    async fn read_all_rows(&self, ctx: &OperationContext) -> AdminResult<Vec<Datum>> {
        ctx.check_interrupted()?;
        let tables = self.table_meta.list_tables().await;
        let renderer = self
            .cluster_view
            .read(|cluster| IdentityRenderer::new(self.format).with_databases(cluster))
            .with_tables(&tables)
            .with_servers(self.server_config.server_names());

        let mut rows = Vec::with_capacity(tables.len());
        for (table, basic) in &tables {
            match self.table_meta.get_status(*table, &ctx.interruptor).await {
                Ok(status) => rows.push(row(table, basic, &status, &renderer)),
                Err(e) if e.is(AdminErrorKind::NotFound) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(rows)
    }

    async fn write_row(
        &self,
        _ctx: &OperationContext,
        _pkey: &Datum,
        _new_value: Option<Datum>,
    ) -> AdminResult<()> {
        Err(read_only(SystemTableKind::TableStatus.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysdb_common::{DatabaseId, Interruptor, NameString, ServerId};
    use sysdb_metadata::{
        DatabaseConfig, InMemoryServerConfigClient, InMemoryTableMetaClient, ServerConfig,
        ShardConfig, TableConfig, WriteAcks, WriteDurability,
    };

    #[tokio::test]
    async fn test_status_flags_follow_readiness() {
        let cluster = SemilatticeView::shared(ClusterMetadata::default());
        let db = DatabaseId::new();
        cluster.apply(|c| {
            c.databases.insert(
                db,
                DatabaseConfig {
                    name: NameString::new("test").unwrap(),
                },
            );
        });
        let servers = Arc::new(InMemoryServerConfigClient::new());
        let server = ServerId::new();
        servers.add_server(server, ServerConfig::new(NameString::new("alpha").unwrap()));
        let meta = Arc::new(InMemoryTableMetaClient::new());
        let table = TableId::new();
        let config = TableConfig {
            basic: TableBasicConfig {
                name: NameString::new("orders").unwrap(),
                database: db,
                primary_key: "id".into(),
            },
            shards: vec![ShardConfig {
                primary_replica: server,
                replicas: [server].into_iter().collect(),
                nonvoting_replicas: Default::default(),
            }],
            write_acks: WriteAcks::Majority,
            durability: WriteDurability::Hard,
        };
        meta.create_table(table, config.clone(), &Interruptor::new())
            .await
            .unwrap();
        meta.set_status(
            table,
            TableStatus {
                readiness: TableReadiness::Reads,
                ..TableStatus::ready(&config)
            },
        );

        let backend = TableStatusBackend::new(IdentifierFormat::Name, cluster, meta, servers);
        let rows = backend
            .read_all_rows(&OperationContext::internal())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0]["status"],
            json!({
                "ready_for_outdated_reads": true,
                "ready_for_reads": true,
                "ready_for_writes": false,
                "all_replicas_ready": false,
            })
        );
        assert_eq!(rows[0]["raft_leader"], json!("alpha"));
        assert_eq!(
            rows[0]["shards"][0]["replicas"],
            json!([{"server": "alpha", "state": "ready"}])
        );
    }

    #[tokio::test]
    async fn test_read_only() {
        let backend = TableStatusBackend::new(
            IdentifierFormat::Uuid,
            SemilatticeView::shared(ClusterMetadata::default()),
            Arc::new(InMemoryTableMetaClient::new()),
            Arc::new(InMemoryServerConfigClient::new()),
        );
        let err = backend
            .write_row(&OperationContext::internal(), &json!("x"), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdminErrorKind::Protected);
    }
}
