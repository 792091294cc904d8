//! Shared fixture for the dispatcher tests
//!
//! `RecordingCluster` stands in for the real cluster interface. It keeps
//! databases and tables in the same in-memory metadata the system tables
//! read, and logs every call it receives so tests can assert on forwarding.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use sysdb_admin::{
    AdminArtificialTables, AdminConfig, BaseTable, ClusterHandles, ClusterInterface,
    EmergencyRepairMode, ModifierConfig, Selection, SindexConfig, SindexStatus,
    TableGenerateConfigParams,
};
use sysdb_common::{
    AdminError, AdminResult, AuthMetadata, Database, DatabaseId, Datum, IdentifierFormat,
    Interruptor, NameString, OperationContext, PeerId, ServerId, TableId, User, UserContext,
    Username,
};
use sysdb_metadata::{
    ClusterDirectoryMetadata, ClusterMetadata, DatabaseConfig, DirectorySnapshot,
    HeartbeatMetadata, InMemoryMailboxManager, InMemoryNamespaceRepo, InMemoryServerConfigClient,
    InMemoryTableMetaClient, SemilatticeView, ServerConfig, ShardConfig, TableBasicConfig,
    TableConfig, TableMetaClient, TableReadiness, Watchable, WatchableMap, WriteAcks,
    WriteDurability,
};

pub const TEST_DB: &str = "test";
pub const TEST_USER: &str = "alice";
pub const TEST_SERVER: &str = "alpha";
pub const EXISTING_TABLE: &str = "customers";

pub fn name(s: &str) -> NameString {
    NameString::new(s).unwrap()
}

pub fn system_db() -> Database {
    Database::system()
}

/// One call received by the real interface, with its arguments rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub verb: &'static str,
    pub args: String,
}

/// A table of a user database, as handed out by `RecordingCluster::table_find`
pub struct RealTable {
    name: NameString,
    database: Database,
    id: TableId,
}

#[async_trait]
impl BaseTable for RealTable {
    fn name(&self) -> &NameString {
        &self.name
    }

    fn database(&self) -> &Database {
        &self.database
    }

    fn table_id(&self) -> Option<TableId> {
        Some(self.id)
    }

    fn primary_key(&self) -> &str {
        "id"
    }

    async fn read_all(&self, _ctx: &OperationContext) -> AdminResult<Vec<Datum>> {
        Ok(Vec::new())
    }

    async fn read_row(&self, _ctx: &OperationContext, _pkey: &Datum) -> AdminResult<Option<Datum>> {
        Ok(None)
    }

    async fn write_row(
        &self,
        _ctx: &OperationContext,
        _pkey: &Datum,
        _new_value: Option<Datum>,
    ) -> AdminResult<()> {
        Ok(())
    }
}

pub struct RecordingCluster {
    cluster_view: Arc<SemilatticeView<ClusterMetadata>>,
    table_meta: Arc<InMemoryTableMetaClient>,
    server: ServerId,
    calls: Mutex<Vec<Call>>,
}

impl RecordingCluster {
    pub fn new(
        cluster_view: Arc<SemilatticeView<ClusterMetadata>>,
        table_meta: Arc<InMemoryTableMetaClient>,
        server: ServerId,
    ) -> Self {
        Self {
            cluster_view,
            table_meta,
            server,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, verb: &'static str, args: String) {
        self.calls.lock().push(Call { verb, args });
    }

    fn find_db(&self, name: &NameString) -> AdminResult<Database> {
        self.cluster_view
            .read(|cluster| cluster.databases_named(name).first().copied())
            .map(|id| Database::new(id, name.clone()))
            .ok_or_else(|| AdminError::database_not_found(name.as_str()))
    }

    async fn find_table(&self, db: &Database, name: &NameString) -> AdminResult<TableId> {
        self.table_meta
            .list_tables()
            .await
            .into_iter()
            .find(|(_, basic)| basic.database == db.id && &basic.name == name)
            .map(|(id, _)| id)
            .ok_or_else(|| AdminError::table_not_found(db.name.as_str(), name.as_str()))
    }

    pub fn table_config_for(
        &self,
        name: &NameString,
        db: DatabaseId,
        primary_key: &str,
        durability: WriteDurability,
    ) -> TableConfig {
        TableConfig {
            basic: TableBasicConfig {
                name: name.clone(),
                database: db,
                primary_key: primary_key.to_string(),
            },
            shards: vec![ShardConfig {
                primary_replica: self.server,
                replicas: [self.server].into_iter().collect(),
                nonvoting_replicas: BTreeSet::new(),
            }],
            write_acks: WriteAcks::Majority,
            durability,
        }
    }
}

#[async_trait]
impl ClusterInterface for RecordingCluster {
    async fn db_create(&self, _ctx: &OperationContext, name: &NameString) -> AdminResult<Datum> {
        self.record("db_create", name.to_string());
        let id = DatabaseId::new();
        self.cluster_view.apply(|cluster| {
            cluster
                .databases
                .insert(id, DatabaseConfig { name: name.clone() })
        });
        Ok(json!({"dbs_created": 1, "id": id.to_string()}))
    }

    async fn db_drop(&self, _ctx: &OperationContext, name: &NameString) -> AdminResult<Datum> {
        self.record("db_drop", name.to_string());
        let db = self.find_db(name)?;
        self.cluster_view
            .apply(|cluster| cluster.databases.remove(&db.id));
        Ok(json!({"dbs_dropped": 1}))
    }

    async fn db_list(&self, _ctx: &OperationContext) -> AdminResult<BTreeSet<NameString>> {
        self.record("db_list", String::new());
        Ok(self.cluster_view.read(|cluster| {
            cluster
                .databases
                .values()
                .map(|config| config.name.clone())
                .collect()
        }))
    }

    async fn db_find(&self, _ctx: &OperationContext, name: &NameString) -> AdminResult<Database> {
        self.record("db_find", name.to_string());
        self.find_db(name)
    }

    async fn db_config(&self, _ctx: &OperationContext, db: &Database) -> AdminResult<Selection> {
        self.record("db_config", db.name.to_string());
        Ok(Selection {
            table: name("db_config"),
            rows: vec![json!({"id": db.id.to_string(), "name": db.name.as_str()})],
            writable: true,
        })
    }

    async fn table_create(
        &self,
        ctx: &OperationContext,
        name: &NameString,
        db: &Database,
        params: &TableGenerateConfigParams,
        primary_key: &str,
        durability: WriteDurability,
    ) -> AdminResult<Datum> {
        self.record(
            "table_create",
            format!(
                "{} {} {:?} {} {:?}",
                name, db.name, params, primary_key, durability
            ),
        );
        let config = self.table_config_for(name, db.id, primary_key, durability);
        self.table_meta
            .create_table(TableId::new(), config, &ctx.interruptor)
            .await?;
        Ok(json!({"tables_created": 1}))
    }

    async fn table_drop(
        &self,
        ctx: &OperationContext,
        name: &NameString,
        db: &Database,
    ) -> AdminResult<Datum> {
        self.record("table_drop", format!("{} {}", name, db.name));
        let table = self.find_table(db, name).await?;
        self.table_meta.drop_table(table, &ctx.interruptor).await?;
        Ok(json!({"tables_dropped": 1}))
    }

    async fn table_list(
        &self,
        _ctx: &OperationContext,
        db: &Database,
    ) -> AdminResult<BTreeSet<NameString>> {
        self.record("table_list", db.name.to_string());
        Ok(self
            .table_meta
            .list_tables()
            .await
            .into_values()
            .filter(|basic| basic.database == db.id)
            .map(|basic| basic.name)
            .collect())
    }

    async fn table_find(
        &self,
        _ctx: &OperationContext,
        name: &NameString,
        db: &Database,
        format: Option<IdentifierFormat>,
    ) -> AdminResult<Arc<dyn BaseTable>> {
        self.record("table_find", format!("{} {} {:?}", name, db.name, format));
        let id = self.find_table(db, name).await?;
        Ok(Arc::new(RealTable {
            name: name.clone(),
            database: db.clone(),
            id,
        }))
    }

    async fn table_estimate_doc_counts(
        &self,
        _ctx: &OperationContext,
        db: &Database,
        name: &NameString,
    ) -> AdminResult<Vec<u64>> {
        self.record("table_estimate_doc_counts", format!("{} {}", db.name, name));
        Ok(vec![7])
    }

    async fn table_config(
        &self,
        _ctx: &OperationContext,
        db: &Database,
        name: &NameString,
        format: Option<IdentifierFormat>,
    ) -> AdminResult<Selection> {
        self.record("table_config", format!("{} {} {:?}", db.name, name, format));
        Ok(Selection {
            table: NameString::new("table_config").unwrap(),
            rows: Vec::new(),
            writable: true,
        })
    }

    async fn table_status(
        &self,
        _ctx: &OperationContext,
        db: &Database,
        name: &NameString,
        format: Option<IdentifierFormat>,
    ) -> AdminResult<Selection> {
        self.record("table_status", format!("{} {} {:?}", db.name, name, format));
        Ok(Selection {
            table: NameString::new("table_status").unwrap(),
            rows: Vec::new(),
            writable: false,
        })
    }

    async fn table_wait(
        &self,
        ctx: &OperationContext,
        db: &Database,
        name: &NameString,
        readiness: TableReadiness,
    ) -> AdminResult<Datum> {
        self.record("table_wait", format!("{} {} {:?}", db.name, name, readiness));
        let table = self.find_table(db, name).await?;
        self.table_meta
            .wait_for_readiness(table, readiness, &ctx.interruptor)
            .await?;
        Ok(json!({"ready": 1}))
    }

    async fn db_wait(
        &self,
        _ctx: &OperationContext,
        db: &Database,
        readiness: TableReadiness,
    ) -> AdminResult<Datum> {
        self.record("db_wait", format!("{} {:?}", db.name, readiness));
        Ok(json!({"ready": 0}))
    }

    async fn table_reconfigure(
        &self,
        _ctx: &OperationContext,
        db: &Database,
        name: &NameString,
        params: &TableGenerateConfigParams,
        dry_run: bool,
    ) -> AdminResult<Datum> {
        self.record(
            "table_reconfigure",
            format!("{} {} {:?} {}", db.name, name, params, dry_run),
        );
        Ok(json!({"reconfigured": 1}))
    }

    async fn db_reconfigure(
        &self,
        _ctx: &OperationContext,
        db: &Database,
        params: &TableGenerateConfigParams,
        dry_run: bool,
    ) -> AdminResult<Datum> {
        self.record(
            "db_reconfigure",
            format!("{} {:?} {}", db.name, params, dry_run),
        );
        Ok(json!({"reconfigured": 0}))
    }

    async fn table_emergency_repair(
        &self,
        _ctx: &OperationContext,
        db: &Database,
        name: &NameString,
        mode: EmergencyRepairMode,
        dry_run: bool,
    ) -> AdminResult<Datum> {
        self.record(
            "table_emergency_repair",
            format!("{} {} {:?} {}", db.name, name, mode, dry_run),
        );
        Ok(json!({"repaired": 1}))
    }

    async fn table_rebalance(
        &self,
        _ctx: &OperationContext,
        db: &Database,
        name: &NameString,
    ) -> AdminResult<Datum> {
        self.record("table_rebalance", format!("{} {}", db.name, name));
        Ok(json!({"rebalanced": 1}))
    }

    async fn db_rebalance(&self, _ctx: &OperationContext, db: &Database) -> AdminResult<Datum> {
        self.record("db_rebalance", db.name.to_string());
        Ok(json!({"rebalanced": 0}))
    }

    async fn grant_global(
        &self,
        _ctx: &OperationContext,
        username: &Username,
        _permissions: &Datum,
    ) -> AdminResult<Datum> {
        self.record("grant_global", username.to_string());
        Err(AdminError::forwarded("grants are applied by the dispatcher"))
    }

    async fn grant_database(
        &self,
        _ctx: &OperationContext,
        db: &NameString,
        username: &Username,
        _permissions: &Datum,
    ) -> AdminResult<Datum> {
        self.record("grant_database", format!("{} {}", db, username));
        Err(AdminError::forwarded("grants are applied by the dispatcher"))
    }

    async fn grant_table(
        &self,
        _ctx: &OperationContext,
        db: &NameString,
        table: &NameString,
        username: &Username,
        _permissions: &Datum,
    ) -> AdminResult<Datum> {
        self.record("grant_table", format!("{} {} {}", db, table, username));
        Err(AdminError::forwarded("grants are applied by the dispatcher"))
    }

    async fn modifier_create(
        &self,
        _ctx: &OperationContext,
        db: &Database,
        table: &NameString,
        config: &ModifierConfig,
    ) -> AdminResult<()> {
        self.record("modifier_create", format!("{} {} {:?}", db.name, table, config));
        Ok(())
    }

    async fn modifier_drop(
        &self,
        _ctx: &OperationContext,
        db: &Database,
        table: &NameString,
    ) -> AdminResult<()> {
        self.record("modifier_drop", format!("{} {}", db.name, table));
        Ok(())
    }

    async fn sindex_create(
        &self,
        _ctx: &OperationContext,
        db: &Database,
        table: &NameString,
        name: &str,
        config: &SindexConfig,
    ) -> AdminResult<()> {
        self.record(
            "sindex_create",
            format!("{} {} {} {:?}", db.name, table, name, config),
        );
        Ok(())
    }

    async fn sindex_drop(
        &self,
        _ctx: &OperationContext,
        db: &Database,
        table: &NameString,
        name: &str,
    ) -> AdminResult<()> {
        self.record("sindex_drop", format!("{} {} {}", db.name, table, name));
        Ok(())
    }

    async fn sindex_rename(
        &self,
        _ctx: &OperationContext,
        db: &Database,
        table: &NameString,
        name: &str,
        new_name: &str,
        overwrite: bool,
    ) -> AdminResult<()> {
        self.record(
            "sindex_rename",
            format!("{} {} {} {} {}", db.name, table, name, new_name, overwrite),
        );
        Ok(())
    }

    async fn sindex_list(
        &self,
        _ctx: &OperationContext,
        db: &Database,
        table: &NameString,
    ) -> AdminResult<BTreeMap<String, (SindexConfig, SindexStatus)>> {
        self.record("sindex_list", format!("{} {}", db.name, table));
        Ok(BTreeMap::new())
    }
}

/// A dispatcher over a one-server cluster with database `test`
///
/// `test` holds table `customers`; user `alice` exists without permissions.
pub struct Fixture {
    pub tables: AdminArtificialTables,
    pub admin: Arc<dyn ClusterInterface>,
    pub real: Arc<RecordingCluster>,
    pub auth_view: Arc<SemilatticeView<AuthMetadata>>,
    pub cluster_view: Arc<SemilatticeView<ClusterMetadata>>,
    pub table_meta: Arc<InMemoryTableMetaClient>,
    pub test_db: Database,
    pub customers: TableId,
    pub server: ServerId,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_config(AdminConfig::default()).await
    }

    pub async fn with_config(config: AdminConfig) -> Self {
        let auth_view = SemilatticeView::shared(AuthMetadata::default());
        auth_view.apply(|auth| {
            auth.users
                .insert(Username::new(TEST_USER).unwrap(), User::default())
        });

        let test_db = Database::new(DatabaseId::new(), name(TEST_DB));
        let cluster_view = SemilatticeView::shared(ClusterMetadata::default());
        cluster_view.apply(|cluster| {
            cluster.databases.insert(
                test_db.id,
                DatabaseConfig {
                    name: test_db.name.clone(),
                },
            )
        });

        let server = ServerId::new();
        let server_config = Arc::new(InMemoryServerConfigClient::new());
        server_config.add_server(server, ServerConfig::new(name(TEST_SERVER)));

        let table_meta = Arc::new(InMemoryTableMetaClient::new());
        let real = Arc::new(RecordingCluster::new(
            cluster_view.clone(),
            table_meta.clone(),
            server,
        ));
        let customers = TableId::new();
        table_meta
            .create_table(
                customers,
                real.table_config_for(
                    &name(EXISTING_TABLE),
                    test_db.id,
                    "id",
                    WriteDurability::Hard,
                ),
                &Interruptor::new(),
            )
            .await
            .unwrap();

        let directory_map: Arc<WatchableMap<PeerId, ClusterDirectoryMetadata>> =
            Arc::new(WatchableMap::new());
        let directory_view: Arc<dyn Watchable<DirectorySnapshot>> = directory_map.clone();
        let handles = ClusterHandles {
            auth_view: auth_view.clone(),
            cluster_view: cluster_view.clone(),
            heartbeat_view: SemilatticeView::shared(HeartbeatMetadata::default()),
            directory_view,
            directory_map,
            table_meta: table_meta.clone(),
            server_config,
            namespace_repo: Arc::new(InMemoryNamespaceRepo::new()),
            mailbox: Arc::new(InMemoryMailboxManager::new()),
        };
        let tables = AdminArtificialTables::build(real.clone(), handles, &config).unwrap();
        let admin = tables.cluster_interface();

        Self {
            tables,
            admin,
            real,
            auth_view,
            cluster_view,
            table_meta,
            test_db,
            customers,
            server,
        }
    }

    /// Context of `alice` as currently stored in the auth metadata
    pub fn user_ctx(&self) -> OperationContext {
        let username = Username::new(TEST_USER).unwrap();
        let record = self
            .auth_view
            .read(|auth| auth.users.get(&username).cloned())
            .unwrap();
        OperationContext::new(UserContext::for_user(username, record), Interruptor::new())
    }

    /// Everything the system tables render from, for before/after comparisons
    pub async fn snapshot(&self) -> (AuthMetadata, ClusterMetadata, Vec<(TableId, Datum)>) {
        let auth = self.auth_view.read(|auth| auth.clone());
        let cluster = self.cluster_view.read(|cluster| cluster.clone());
        let mut tables = Vec::new();
        for id in self.table_meta.list_tables().await.into_keys() {
            let (config, version) = self
                .table_meta
                .get_config(id, &Interruptor::new())
                .await
                .unwrap();
            tables.push((
                id,
                json!({"config": config, "version": version}),
            ));
        }
        (auth, cluster, tables)
    }
}
