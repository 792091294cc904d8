//! `rethinkdb.db_config`
//!
//! Inserting a row creates a database, updating it renames the database and
//! deleting it drops the database together with its tables.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use sysdb_common::{AdminError, AdminResult, DatabaseId, Datum, Interruptor, OperationContext};
use sysdb_metadata::{ClusterMetadata, DatabaseConfig, SemilatticeView, TableMetaClient};

use crate::backend::ArtificialTableBackend;
use crate::datum::{as_object, check_keys, check_primary_key, expect_name, expect_uuid, require};

pub struct DbConfigBackend {
    cluster_view: Arc<SemilatticeView<ClusterMetadata>>,
    table_meta: Arc<dyn TableMetaClient>,
}

impl DbConfigBackend {
    pub fn new(
        cluster_view: Arc<SemilatticeView<ClusterMetadata>>,
        table_meta: Arc<dyn TableMetaClient>,
    ) -> Self {
        Self {
            cluster_view,
            table_meta,
        }
    }

    /// Removes the database first, then its tables
    ///
    /// The interruptor is only honoured before the database is removed. Once
    /// it is gone the table drops run to completion, so the caller never sees
    /// a database with some of its tables missing.
    async fn drop_database(&self, ctx: &OperationContext, db: DatabaseId) -> AdminResult<()> {
        ctx.check_interrupted()?;
        if !self.cluster_view.read(|c| c.databases.contains_key(&db)) {
            return Ok(());
        }
        let tables = self.table_meta.list_tables().await;
        self.cluster_view.apply(|c| c.databases.remove(&db));
        tracing::info!(%db, "dropped database");

        let uninterruptible = Interruptor::new();
        for (table, basic) in tables.iter().filter(|(_, b)| b.database == db) {
            tracing::debug!(%db, %table, name = %basic.name, "dropping table of dropped database");
            if let Err(err) = self.table_meta.drop_table(*table, &uninterruptible).await {
                tracing::warn!(%db, %table, error = %err, "failed to drop table of dropped database");
            }
        }
        Ok(())
    }
}

fn row(id: &DatabaseId, config: &DatabaseConfig) -> Datum {
    json!({
        "id": id.to_string(),
        "name": config.name.as_str(),
    })
}

#[async_trait]
impl ArtificialTableBackend for DbConfigBackend {
    async fn read_all_rows(&self, ctx: &OperationContext) -> AdminResult<Vec<Datum>> {
        ctx.check_interrupted()?;
        Ok(self.cluster_view.read(|cluster| {
            cluster
                .databases
                .iter()
                .map(|(id, config)| row(id, config))
                .collect()
        }))
    }

    async fn write_row(
        &self,
        ctx: &OperationContext,
        pkey: &Datum,
        new_value: Option<Datum>,
    ) -> AdminResult<()> {
        ctx.check_interrupted()?;
        let db = DatabaseId::from_uuid(expect_uuid(pkey, "id")?);
        let Some(row) = new_value else {
            return self.drop_database(ctx, db).await;
        };

        let obj = as_object(&row)?;
        check_keys(obj, &["id", "name"])?;
        check_primary_key(obj, pkey)?;
        let name = expect_name(require(obj, "name")?, "name")?;
        if name.is_system_database() {
            return Err(AdminError::invalid(format!(
                "Database name `{}` is reserved.",
                name
            )));
        }

        self.cluster_view.try_apply(|cluster| {
            let clash = cluster
                .databases
                .iter()
                .any(|(other, config)| *other != db && config.name == name);
            if clash {
                return Err(AdminError::invalid(format!(
                    "Database `{}` already exists.",
                    name
                )));
            }
            cluster
                .databases
                .insert(db, DatabaseConfig { name: name.clone() });
            Ok(())
        })?;
        tracing::info!(%db, %name, "wrote database config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use sysdb_common::{AdminErrorKind, NameString, ServerId, TableId};
    use sysdb_metadata::{
        InMemoryTableMetaClient, ShardConfig, TableBasicConfig, TableConfig, TableReadiness,
        TableStatus, WriteAcks, WriteDurability,
    };

    fn backend() -> (
        Arc<SemilatticeView<ClusterMetadata>>,
        Arc<InMemoryTableMetaClient>,
        DbConfigBackend,
    ) {
        let cluster = SemilatticeView::shared(ClusterMetadata::default());
        let meta = Arc::new(InMemoryTableMetaClient::new());
        (
            cluster.clone(),
            meta.clone(),
            DbConfigBackend::new(cluster, meta),
        )
    }

    #[tokio::test]
    async fn test_create_and_rename() {
        let (cluster, _, backend) = backend();
        let ctx = OperationContext::internal();
        let db = DatabaseId::new();
        let pkey = json!(db.to_string());
        backend
            .write_row(&ctx, &pkey, Some(json!({"id": db.to_string(), "name": "test"})))
            .await
            .unwrap();
        backend
            .write_row(&ctx, &pkey, Some(json!({"id": db.to_string(), "name": "prod"})))
            .await
            .unwrap();
        assert_eq!(
            cluster.read(|c| c.database_name(&db).cloned()).unwrap().as_str(),
            "prod"
        );
        let rows = backend.read_all_rows(&ctx).await.unwrap();
        assert_eq!(rows, vec![json!({"id": db.to_string(), "name": "prod"})]);
    }

    #[tokio::test]
    async fn test_rejects_collisions_and_reserved_name() {
        let (_, _, backend) = backend();
        let ctx = OperationContext::internal();
        let a = DatabaseId::new();
        let b = DatabaseId::new();
        backend
            .write_row(&ctx, &json!(a.to_string()), Some(json!({"id": a.to_string(), "name": "test"})))
            .await
            .unwrap();
        let err = backend
            .write_row(&ctx, &json!(b.to_string()), Some(json!({"id": b.to_string(), "name": "test"})))
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdminErrorKind::InvalidArgument);

        let err = backend
            .write_row(
                &ctx,
                &json!(b.to_string()),
                Some(json!({"id": b.to_string(), "name": "rethinkdb"})),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdminErrorKind::InvalidArgument);
    }

    fn table_config(name: &str, db: DatabaseId) -> TableConfig {
        let server = ServerId::new();
        TableConfig {
            basic: TableBasicConfig {
                name: NameString::new(name).unwrap(),
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
        }
    }

    /// Pulses `interruptor` once the first table has been dropped
    struct InterruptAfterFirstDrop {
        inner: InMemoryTableMetaClient,
        interruptor: Interruptor,
        drops: AtomicUsize,
    }

    #[async_trait]
    impl TableMetaClient for InterruptAfterFirstDrop {
        async fn list_tables(&self) -> BTreeMap<TableId, TableBasicConfig> {
            self.inner.list_tables().await
        }

        async fn get_config(
            &self,
            table: TableId,
            interruptor: &Interruptor,
        ) -> AdminResult<(TableConfig, u64)> {
            self.inner.get_config(table, interruptor).await
        }

        async fn get_status(
            &self,
            table: TableId,
            interruptor: &Interruptor,
        ) -> AdminResult<TableStatus> {
            self.inner.get_status(table, interruptor).await
        }

        async fn create_table(
            &self,
            table: TableId,
            config: TableConfig,
            interruptor: &Interruptor,
        ) -> AdminResult<()> {
            self.inner.create_table(table, config, interruptor).await
        }

        async fn drop_table(&self, table: TableId, interruptor: &Interruptor) -> AdminResult<()> {
            self.inner.drop_table(table, interruptor).await?;
            if self.drops.fetch_add(1, Ordering::SeqCst) == 0 {
                self.interruptor.pulse();
            }
            Ok(())
        }

        async fn set_config(
            &self,
            table: TableId,
            expected_version: u64,
            config: TableConfig,
            interruptor: &Interruptor,
        ) -> AdminResult<u64> {
            self.inner
                .set_config(table, expected_version, config, interruptor)
                .await
        }

        async fn wait_for_readiness(
            &self,
            table: TableId,
            readiness: TableReadiness,
            interruptor: &Interruptor,
        ) -> AdminResult<()> {
            self.inner
                .wait_for_readiness(table, readiness, interruptor)
                .await
        }
    }

    #[tokio::test]
    async fn test_delete_drops_tables() {
        let (cluster, meta, backend) = backend();
        let ctx = OperationContext::internal();
        let db = DatabaseId::new();
        backend
            .write_row(&ctx, &json!(db.to_string()), Some(json!({"id": db.to_string(), "name": "test"})))
            .await
            .unwrap();
        meta.create_table(TableId::new(), table_config("orders", db), &Interruptor::new())
            .await
            .unwrap();

        backend.write_row(&ctx, &json!(db.to_string()), None).await.unwrap();
        assert!(cluster.read(|c| c.databases.is_empty()));
        assert!(meta.list_tables().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_interrupted_before_start_changes_nothing() {
        let (cluster, meta, backend) = backend();
        let ctx = OperationContext::internal();
        let db = DatabaseId::new();
        backend
            .write_row(&ctx, &json!(db.to_string()), Some(json!({"id": db.to_string(), "name": "test"})))
            .await
            .unwrap();
        meta.create_table(TableId::new(), table_config("orders", db), &Interruptor::new())
            .await
            .unwrap();

        ctx.interruptor.pulse();
        let err = backend
            .write_row(&ctx, &json!(db.to_string()), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdminErrorKind::Interrupted);
        assert!(cluster.read(|c| c.databases.contains_key(&db)));
        assert_eq!(meta.list_tables().await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_is_not_split_by_interrupt() {
        let cluster = SemilatticeView::shared(ClusterMetadata::default());
        let ctx = OperationContext::internal();
        let meta = Arc::new(InterruptAfterFirstDrop {
            inner: InMemoryTableMetaClient::new(),
            interruptor: ctx.interruptor.clone(),
            drops: AtomicUsize::new(0),
        });
        let backend = DbConfigBackend::new(cluster.clone(), meta.clone());

        let db = DatabaseId::new();
        backend
            .write_row(&ctx, &json!(db.to_string()), Some(json!({"id": db.to_string(), "name": "test"})))
            .await
            .unwrap();
        for name in ["orders", "invoices", "refunds"] {
            meta.create_table(TableId::new(), table_config(name, db), &Interruptor::new())
                .await
                .unwrap();
        }

        backend.write_row(&ctx, &json!(db.to_string()), None).await.unwrap();
        assert!(ctx.interruptor.is_pulsed());
        assert!(cluster.read(|c| c.databases.is_empty()));
        assert!(meta.list_tables().await.is_empty());
    }
}
