//! `rethinkdb.table_config`
//!
//! Inserting a row creates a table, updating it applies a compare-and-set
//! change to the table's configuration and deleting it drops the table.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use sysdb_common::{
    AdminError, AdminErrorKind, AdminResult, DEFAULT_PRIMARY_KEY, DatabaseId, Datum,
    IdentifierFormat, NameString, OperationContext, ServerId, TableId, system_database_id,
};
use sysdb_metadata::{
    ClusterMetadata, SemilatticeView, ServerConfigClient, ShardConfig, TableBasicConfig,
    TableConfig, TableMetaClient, WriteAcks, WriteDurability,
};

use crate::backend::ArtificialTableBackend;
use crate::datum::{
    as_object, check_keys, check_primary_key, expect_name, expect_str, expect_uuid, require,
};
use crate::render::IdentityRenderer;

const FIELDS: &[&str] = &[
    "id",
    "name",
    "db",
    "primary_key",
    "shards",
    "write_acks",
    "durability",
];

pub struct TableConfigBackend {
    format: IdentifierFormat,
    cluster_view: Arc<SemilatticeView<ClusterMetadata>>,
    table_meta: Arc<dyn TableMetaClient>,
    server_config: Arc<dyn ServerConfigClient>,
}

impl TableConfigBackend {
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

    async fn renderer(&self) -> IdentityRenderer {
        let tables = self.table_meta.list_tables().await;
        self.cluster_view
            .read(|cluster| IdentityRenderer::new(self.format).with_databases(cluster))
            .with_tables(&tables)
            .with_servers(self.server_config.server_names())
    }

    /// Shard layout for a new table whose row did not specify one
    fn default_shards(&self) -> AdminResult<Vec<ShardConfig>> {
        let server = self
            .server_config
            .server_names()
            .into_keys()
            .next()
            .ok_or_else(|| AdminError::invalid("There are no servers available to host the table."))?;
        Ok(vec![ShardConfig {
            primary_replica: server,
            replicas: [server].into_iter().collect(),
            nonvoting_replicas: BTreeSet::new(),
        }])
    }

    async fn delete_table(&self, ctx: &OperationContext, table: TableId) -> AdminResult<()> {
        match self.table_meta.drop_table(table, &ctx.interruptor).await {
            Ok(()) => {
                tracing::info!(%table, "dropped table");
                Ok(())
            }
            // Deleting a row that is already gone is a no-op
            Err(e) if e.is(AdminErrorKind::NotFound) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

pub(crate) fn render_config(
    table: &TableId,
    config: &TableConfig,
    renderer: &IdentityRenderer,
) -> Datum {
    let shards: Vec<Datum> = config
        .shards
        .iter()
        .map(|shard| {
            json!({
                "primary_replica": renderer.server(&shard.primary_replica),
                "replicas": shard.replicas.iter().map(|s| renderer.server(s)).collect::<Vec<_>>(),
                "nonvoting_replicas": shard
                    .nonvoting_replicas
                    .iter()
                    .map(|s| renderer.server(s))
                    .collect::<Vec<_>>(),
            })
        })
        .collect();
    json!({
        "id": table.to_string(),
        "name": config.basic.name.as_str(),
        "db": renderer.database(&config.basic.database),
        "primary_key": config.basic.primary_key,
        "shards": shards,
        "write_acks": config.write_acks.as_str(),
        "durability": config.durability.as_str(),
    })
}

fn parse_servers(
    value: &Value,
    key: &str,
    renderer: &IdentityRenderer,
) -> AdminResult<BTreeSet<ServerId>> {
    value
        .as_array()
        .ok_or_else(|| AdminError::invalid(format!("Expected an array for `{}`.", key)))?
        .iter()
        .map(|server| renderer.parse_server(server, key))
        .collect()
}

fn parse_shards(value: &Value, renderer: &IdentityRenderer) -> AdminResult<Vec<ShardConfig>> {
    let shards = value
        .as_array()
        .filter(|shards| !shards.is_empty())
        .ok_or_else(|| AdminError::invalid("Expected a non-empty array for `shards`."))?;
    shards
        .iter()
        .map(|shard| {
            let obj = as_object(shard)?;
            check_keys(obj, &["primary_replica", "replicas", "nonvoting_replicas"])?;
            let primary_replica =
                renderer.parse_server(require(obj, "primary_replica")?, "primary_replica")?;
            let replicas = parse_servers(require(obj, "replicas")?, "replicas", renderer)?;
            let nonvoting_replicas = match obj.get("nonvoting_replicas") {
                Some(value) => parse_servers(value, "nonvoting_replicas", renderer)?,
                None => BTreeSet::new(),
            };
            if !replicas.contains(&primary_replica) {
                return Err(AdminError::invalid(
                    "The primary replica must also be one of the replicas.",
                ));
            }
            if !nonvoting_replicas.is_subset(&replicas) {
                return Err(AdminError::invalid(
                    "Every non-voting replica must also be one of the replicas.",
                ));
            }
            Ok(ShardConfig {
                primary_replica,
                replicas,
                nonvoting_replicas,
            })
        })
        .collect()
}

fn parse_write_acks(obj: &Map<String, Value>) -> AdminResult<WriteAcks> {
    match obj.get("write_acks") {
        None => Ok(WriteAcks::default()),
        Some(value) => match expect_str(value, "write_acks")? {
            "majority" => Ok(WriteAcks::Majority),
            "single" => Ok(WriteAcks::Single),
            other => Err(AdminError::invalid(format!(
                "Expected \"majority\" or \"single\" for `write_acks`, got \"{}\".",
                other
            ))),
        },
    }
}

fn parse_durability(obj: &Map<String, Value>) -> AdminResult<WriteDurability> {
    match obj.get("durability") {
        None => Ok(WriteDurability::default()),
        Some(value) => match expect_str(value, "durability")? {
            "hard" => Ok(WriteDurability::Hard),
            "soft" => Ok(WriteDurability::Soft),
            other => Err(AdminError::invalid(format!(
                "Expected \"hard\" or \"soft\" for `durability`, got \"{}\".",
                other
            ))),
        },
    }
}

fn check_name_free(
    renderer: &IdentityRenderer,
    table: TableId,
    db: DatabaseId,
    name: &NameString,
    tables: &std::collections::BTreeMap<TableId, TableBasicConfig>,
) -> AdminResult<()> {
    let clash = tables
        .iter()
        .any(|(id, basic)| *id != table && basic.database == db && basic.name == *name);
    if clash {
        Err(AdminError::invalid(format!(
            "Table `{}.{}` already exists.",
            renderer.database(&db).as_str().unwrap_or_default(),
            name
        )))
    } else {
        Ok(())
    }
}

#[async_trait]
impl ArtificialTableBackend for TableConfigBackend {
    async fn read_all_rows(&self, ctx: &OperationContext) -> AdminResult<Vec<Datum>> {
        ctx.check_interrupted()?;
        let renderer = self.renderer().await;
        let mut rows = Vec::new();
        for table in self.table_meta.list_tables().await.into_keys() {
            match self.table_meta.get_config(table, &ctx.interruptor).await {
                Ok((config, _)) => rows.push(render_config(&table, &config, &renderer)),
                // Dropped between listing and reading
                Err(e) if e.is(AdminErrorKind::NotFound) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(rows)
    }

    async fn read_row(&self, ctx: &OperationContext, pkey: &Datum) -> AdminResult<Option<Datum>> {
        ctx.check_interrupted()?;
        let Ok(uuid) = expect_uuid(pkey, "id") else {
            return Ok(None);
        };
        let table = TableId::from_uuid(uuid);
        match self.table_meta.get_config(table, &ctx.interruptor).await {
            Ok((config, _)) => {
                let renderer = self.renderer().await;
                Ok(Some(render_config(&table, &config, &renderer)))
            }
            Err(e) if e.is(AdminErrorKind::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn write_row(
        &self,
        ctx: &OperationContext,
        pkey: &Datum,
        new_value: Option<Datum>,
    ) -> AdminResult<()> {
        ctx.check_interrupted()?;
        let table = TableId::from_uuid(expect_uuid(pkey, "id")?);
        let Some(row) = new_value else {
            return self.delete_table(ctx, table).await;
        };

        let obj = as_object(&row)?;
        check_keys(obj, FIELDS)?;
        check_primary_key(obj, pkey)?;
        let renderer = self.renderer().await;
        let tables = self.table_meta.list_tables().await;

        let name = expect_name(require(obj, "name")?, "name")?;
        let db = renderer.parse_database(require(obj, "db")?, "db")?;
        if db == system_database_id() {
            return Err(AdminError::invalid(
                "Database `rethinkdb` is special; you can't create or move tables into it.",
            ));
        }
        check_name_free(&renderer, table, db, &name, &tables)?;
        let write_acks = parse_write_acks(obj)?;
        let durability = parse_durability(obj)?;
        let requested_key = obj
            .get("primary_key")
            .map(|value| expect_str(value, "primary_key").map(str::to_string))
            .transpose()?;

        match self.table_meta.get_config(table, &ctx.interruptor).await {
            Ok((old, version)) => {
                if let Some(key) = &requested_key {
                    if *key != old.basic.primary_key {
                        return Err(AdminError::invalid(
                            "It's illegal to change a table's primary key.",
                        ));
                    }
                }
                let shards = match obj.get("shards") {
                    Some(value) => parse_shards(value, &renderer)?,
                    None => old.shards.clone(),
                };
                let config = TableConfig {
                    basic: TableBasicConfig {
                        name,
                        database: db,
                        primary_key: old.basic.primary_key.clone(),
                    },
                    shards,
                    write_acks,
                    durability,
                };
                let new_version = self
                    .table_meta
                    .set_config(table, version, config, &ctx.interruptor)
                    .await?;
                tracing::info!(%table, version = new_version, "updated table config");
                Ok(())
            }
            Err(e) if e.is(AdminErrorKind::NotFound) => {
                let shards = match obj.get("shards") {
                    Some(value) => parse_shards(value, &renderer)?,
                    None => self.default_shards()?,
                };
                let config = TableConfig {
                    basic: TableBasicConfig {
                        name: name.clone(),
                        database: db,
                        primary_key: requested_key.unwrap_or_else(|| DEFAULT_PRIMARY_KEY.to_string()),
                    },
                    shards,
                    write_acks,
                    durability,
                };
                self.table_meta
                    .create_table(table, config, &ctx.interruptor)
                    .await?;
                tracing::info!(%table, %name, "created table");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
