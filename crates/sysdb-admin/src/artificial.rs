//! Dispatcher for queries against the system database
//!
//! Sits in front of the real cluster interface. Calls that do not target the
//! system database are forwarded unchanged; calls that do are answered from
//! the registered system table backends.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;

use sysdb_common::{
    AdminError, AdminResult, Database, Datum, IdentifierFormat, NameString, OperationContext,
    PermissionScope, SYSTEM_DATABASE_NAME, Username, system_database_id,
};
use sysdb_metadata::{TableReadiness, WriteDurability};
use sysdb_tables::{PermissionsBackend, SystemTableKind, TableBackend, read_only};

use crate::cluster_interface::{BaseTable, ClusterInterface, Selection};
use crate::params::{
    EmergencyRepairMode, ModifierConfig, SindexConfig, SindexStatus, TableGenerateConfigParams,
};
use crate::registry::{BackendRegistry, TableBackendEntry};
use crate::table::ArtificialTable;

fn special(what: &str) -> String {
    format!("Database `{}` is special; {}.", SYSTEM_DATABASE_NAME, what)
}

fn not_applicable(verb: &str) -> AdminError {
    AdminError::unsupported(special(&format!(
        "`{}` is not applicable to the tables in it, which are neither sharded nor replicated",
        verb
    )))
}

fn system_scope() -> PermissionScope {
    PermissionScope::Database(system_database_id())
}

pub struct ArtificialClusterInterface {
    registry: Arc<BackendRegistry>,
    next: Arc<dyn ClusterInterface>,
    grants: Arc<PermissionsBackend>,
    default_format: IdentifierFormat,
}

impl ArtificialClusterInterface {
    /// Wrap `next`, serving the system database from `registry`
    ///
    /// Grants are applied through the `permissions` backend registered for
    /// `default_format`.
    pub fn new(
        registry: Arc<BackendRegistry>,
        next: Arc<dyn ClusterInterface>,
        default_format: IdentifierFormat,
    ) -> AdminResult<Self> {
        let name =
            NameString::new(SystemTableKind::Permissions.name()).map_err(AdminError::invalid)?;
        let grants = match registry
            .resolve(&name)
            .map(|entry| BackendRegistry::select(entry, default_format))
        {
            Some(TableBackend::Permissions(backend)) => backend.clone(),
            _ => {
                return Err(AdminError::invalid(
                    "The registry has no `permissions` backend to apply grants to.",
                ));
            }
        };
        Ok(Self {
            registry,
            next,
            grants,
            default_format,
        })
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    fn is_system(db: &Database) -> bool {
        db.name.is_system_database()
    }

    fn resolve(&self, name: &NameString) -> AdminResult<&TableBackendEntry> {
        self.registry
            .resolve(name)
            .ok_or_else(|| AdminError::table_not_found(SYSTEM_DATABASE_NAME, name.as_str()))
    }

    fn select<'a>(
        &self,
        entry: &'a TableBackendEntry,
        format: Option<IdentifierFormat>,
    ) -> &'a TableBackend {
        BackendRegistry::select(entry, format.unwrap_or(self.default_format))
    }

    /// Resolve a system table for a call that would modify it
    fn resolve_writable(&self, name: &NameString) -> AdminResult<&TableBackendEntry> {
        let entry = self.resolve(name)?;
        if !entry.capabilities().writable {
            return Err(read_only(name.as_str()));
        }
        Ok(entry)
    }

    async fn grant(
        &self,
        ctx: &OperationContext,
        username: &Username,
        scope: PermissionScope,
        permissions: &Datum,
    ) -> AdminResult<Datum> {
        ctx.check_interrupted()?;
        ctx.user.require_config(scope)?;
        self.grants.grant(username, scope, permissions)
    }
}

#[async_trait]
impl ClusterInterface for ArtificialClusterInterface {
    async fn db_create(&self, ctx: &OperationContext, name: &NameString) -> AdminResult<Datum> {
        if name.is_system_database() {
            ctx.check_interrupted()?;
            return Err(AdminError::protected(format!(
                "Database `{}` already exists.",
                name
            )));
        }
        self.next.db_create(ctx, name).await
    }

    async fn db_drop(&self, ctx: &OperationContext, name: &NameString) -> AdminResult<Datum> {
        if name.is_system_database() {
            ctx.check_interrupted()?;
            return Err(AdminError::protected(special("you can't delete it")));
        }
        self.next.db_drop(ctx, name).await
    }

    async fn db_list(&self, ctx: &OperationContext) -> AdminResult<BTreeSet<NameString>> {
        let mut names = self.next.db_list(ctx).await?;
        names.insert(NameString::system_database());
        Ok(names)
    }

    async fn db_find(&self, ctx: &OperationContext, name: &NameString) -> AdminResult<Database> {
        if name.is_system_database() {
            ctx.check_interrupted()?;
            return Ok(Database::system());
        }
        self.next.db_find(ctx, name).await
    }

    async fn db_config(&self, ctx: &OperationContext, db: &Database) -> AdminResult<Selection> {
        if Self::is_system(db) {
            ctx.check_interrupted()?;
            return Err(AdminError::protected(special("you can't configure it")));
        }
        self.next.db_config(ctx, db).await
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
        if Self::is_system(db) {
            ctx.check_interrupted()?;
            return Err(AdminError::protected(special("you can't create new tables in it")));
        }
        self.next
            .table_create(ctx, name, db, params, primary_key, durability)
            .await
    }

    async fn table_drop(
        &self,
        ctx: &OperationContext,
        name: &NameString,
        db: &Database,
    ) -> AdminResult<Datum> {
        if Self::is_system(db) {
            ctx.check_interrupted()?;
            return Err(AdminError::protected(special("you can't delete tables from it")));
        }
        self.next.table_drop(ctx, name, db).await
    }

    async fn table_list(
        &self,
        ctx: &OperationContext,
        db: &Database,
    ) -> AdminResult<BTreeSet<NameString>> {
        if Self::is_system(db) {
            ctx.check_interrupted()?;
            return Ok(self.registry.list_names());
        }
        self.next.table_list(ctx, db).await
    }

    async fn table_find(
        &self,
        ctx: &OperationContext,
        name: &NameString,
        db: &Database,
        format: Option<IdentifierFormat>,
    ) -> AdminResult<Arc<dyn BaseTable>> {
        if !Self::is_system(db) {
            return self.next.table_find(ctx, name, db, format).await;
        }
        ctx.check_interrupted()?;
        let entry = self.resolve(name)?;
        let backend = self.select(entry, format);
        tracing::debug!(table = %name, ?format, "found system table");
        Ok(Arc::new(ArtificialTable::new(
            entry.table_name.clone(),
            backend.clone(),
        )))
    }

    async fn table_estimate_doc_counts(
        &self,
        ctx: &OperationContext,
        db: &Database,
        name: &NameString,
    ) -> AdminResult<Vec<u64>> {
        if !Self::is_system(db) {
            return self.next.table_estimate_doc_counts(ctx, db, name).await;
        }
        ctx.check_interrupted()?;
        let entry = self.resolve(name)?;
        ctx.user.require_read(system_scope())?;
        let rows = self.select(entry, None).read_all_rows(ctx).await?;
        Ok(vec![rows.len() as u64])
    }

    async fn table_config(
        &self,
        ctx: &OperationContext,
        db: &Database,
        name: &NameString,
        format: Option<IdentifierFormat>,
    ) -> AdminResult<Selection> {
        if !Self::is_system(db) {
            return self.next.table_config(ctx, db, name, format).await;
        }
        ctx.check_interrupted()?;
        let entry = self.resolve(name)?;
        let capabilities = entry.capabilities();
        if !capabilities.supports_config {
            return Err(AdminError::unsupported(format!(
                "Table `{}.{}` has no configuration.",
                SYSTEM_DATABASE_NAME, name
            )));
        }
        ctx.user.require_read(system_scope())?;
        tracing::debug!(table = %name, ?format, "serving config of system table");
        let rows = self.select(entry, format).read_all_rows(ctx).await?;
        Ok(Selection {
            table: entry.table_name.clone(),
            rows,
            writable: capabilities.writable,
        })
    }

    async fn table_status(
        &self,
        ctx: &OperationContext,
        db: &Database,
        name: &NameString,
        format: Option<IdentifierFormat>,
    ) -> AdminResult<Selection> {
        if !Self::is_system(db) {
            return self.next.table_status(ctx, db, name, format).await;
        }
        ctx.check_interrupted()?;
        let entry = self.resolve(name)?;
        if !entry.capabilities().supports_status {
            return Err(AdminError::unsupported(format!(
                "Table `{}.{}` has no status.",
                SYSTEM_DATABASE_NAME, name
            )));
        }
        ctx.user.require_read(system_scope())?;
        tracing::debug!(table = %name, ?format, "serving status of system table");
        let rows = self.select(entry, format).read_all_rows(ctx).await?;
        Ok(Selection {
            table: entry.table_name.clone(),
            rows,
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
        if !Self::is_system(db) {
            return self.next.table_wait(ctx, db, name, readiness).await;
        }
        ctx.check_interrupted()?;
        self.resolve(name)?;
        Err(not_applicable("wait"))
    }

    async fn db_wait(
        &self,
        ctx: &OperationContext,
        db: &Database,
        readiness: TableReadiness,
    ) -> AdminResult<Datum> {
        if !Self::is_system(db) {
            return self.next.db_wait(ctx, db, readiness).await;
        }
        ctx.check_interrupted()?;
        Err(not_applicable("wait"))
    }

    async fn table_reconfigure(
        &self,
        ctx: &OperationContext,
        db: &Database,
        name: &NameString,
        params: &TableGenerateConfigParams,
        dry_run: bool,
    ) -> AdminResult<Datum> {
        if !Self::is_system(db) {
            return self
                .next
                .table_reconfigure(ctx, db, name, params, dry_run)
                .await;
        }
        ctx.check_interrupted()?;
        self.resolve(name)?;
        Err(not_applicable("reconfigure"))
    }

    async fn db_reconfigure(
        &self,
        ctx: &OperationContext,
        db: &Database,
        params: &TableGenerateConfigParams,
        dry_run: bool,
    ) -> AdminResult<Datum> {
        if !Self::is_system(db) {
            return self.next.db_reconfigure(ctx, db, params, dry_run).await;
        }
        ctx.check_interrupted()?;
        Err(not_applicable("reconfigure"))
    }

    async fn table_emergency_repair(
        &self,
        ctx: &OperationContext,
        db: &Database,
        name: &NameString,
        mode: EmergencyRepairMode,
        dry_run: bool,
    ) -> AdminResult<Datum> {
        if !Self::is_system(db) {
            return self
                .next
                .table_emergency_repair(ctx, db, name, mode, dry_run)
                .await;
        }
        ctx.check_interrupted()?;
        self.resolve(name)?;
        Err(not_applicable("emergency_repair"))
    }

    async fn table_rebalance(
        &self,
        ctx: &OperationContext,
        db: &Database,
        name: &NameString,
    ) -> AdminResult<Datum> {
        if !Self::is_system(db) {
            return self.next.table_rebalance(ctx, db, name).await;
        }
        ctx.check_interrupted()?;
        self.resolve(name)?;
        Err(not_applicable("rebalance"))
    }

    async fn db_rebalance(&self, ctx: &OperationContext, db: &Database) -> AdminResult<Datum> {
        if !Self::is_system(db) {
            return self.next.db_rebalance(ctx, db).await;
        }
        ctx.check_interrupted()?;
        Err(not_applicable("rebalance"))
    }

    async fn grant_global(
        &self,
        ctx: &OperationContext,
        username: &Username,
        permissions: &Datum,
    ) -> AdminResult<Datum> {
        self.grant(ctx, username, PermissionScope::Global, permissions)
            .await
    }

    async fn grant_database(
        &self,
        ctx: &OperationContext,
        db: &NameString,
        username: &Username,
        permissions: &Datum,
    ) -> AdminResult<Datum> {
        let db = self.db_find(ctx, db).await?;
        self.grant(ctx, username, PermissionScope::Database(db.id), permissions)
            .await
    }

    async fn grant_table(
        &self,
        ctx: &OperationContext,
        db: &NameString,
        table: &NameString,
        username: &Username,
        permissions: &Datum,
    ) -> AdminResult<Datum> {
        if db.is_system_database() {
            ctx.check_interrupted()?;
            self.resolve(table)?;
            return Err(AdminError::unsupported(special(
                "grant permissions on the database itself instead of its tables",
            )));
        }
        let db = self.next.db_find(ctx, db).await?;
        let found = self.next.table_find(ctx, table, &db, None).await?;
        let table_id = found
            .table_id()
            .ok_or_else(|| AdminError::table_not_found(db.name.as_str(), table.as_str()))?;
        self.grant(
            ctx,
            username,
            PermissionScope::Table(db.id, table_id),
            permissions,
        )
        .await
    }

    async fn modifier_create(
        &self,
        ctx: &OperationContext,
        db: &Database,
        table: &NameString,
        config: &ModifierConfig,
    ) -> AdminResult<()> {
        if !Self::is_system(db) {
            return self.next.modifier_create(ctx, db, table, config).await;
        }
        ctx.check_interrupted()?;
        self.resolve_writable(table)?;
        Err(AdminError::unsupported(special("you can't attach write hooks to the tables in it")))
    }

    async fn modifier_drop(
        &self,
        ctx: &OperationContext,
        db: &Database,
        table: &NameString,
    ) -> AdminResult<()> {
        if !Self::is_system(db) {
            return self.next.modifier_drop(ctx, db, table).await;
        }
        ctx.check_interrupted()?;
        self.resolve_writable(table)?;
        Err(AdminError::unsupported(special("the tables in it have no write hooks")))
    }

    async fn sindex_create(
        &self,
        ctx: &OperationContext,
        db: &Database,
        table: &NameString,
        name: &str,
        config: &SindexConfig,
    ) -> AdminResult<()> {
        if !Self::is_system(db) {
            return self.next.sindex_create(ctx, db, table, name, config).await;
        }
        ctx.check_interrupted()?;
        self.resolve(table)?;
        Err(AdminError::unsupported(special(
            "you can't create secondary indexes on the tables in it",
        )))
    }

    async fn sindex_drop(
        &self,
        ctx: &OperationContext,
        db: &Database,
        table: &NameString,
        name: &str,
    ) -> AdminResult<()> {
        if !Self::is_system(db) {
            return self.next.sindex_drop(ctx, db, table, name).await;
        }
        ctx.check_interrupted()?;
        self.resolve(table)?;
        Err(AdminError::unsupported(special("the tables in it have no secondary indexes")))
    }

    async fn sindex_rename(
        &self,
        ctx: &OperationContext,
        db: &Database,
        table: &NameString,
        name: &str,
        new_name: &str,
        overwrite: bool,
    ) -> AdminResult<()> {
        if !Self::is_system(db) {
            return self
                .next
                .sindex_rename(ctx, db, table, name, new_name, overwrite)
                .await;
        }
        ctx.check_interrupted()?;
        self.resolve(table)?;
        Err(AdminError::unsupported(special("the tables in it have no secondary indexes")))
    }

    async fn sindex_list(
        &self,
        ctx: &OperationContext,
        db: &Database,
        table: &NameString,
    ) -> AdminResult<BTreeMap<String, (SindexConfig, SindexStatus)>> {
        if !Self::is_system(db) {
            return self.next.sindex_list(ctx, db, table).await;
        }
        ctx.check_interrupted()?;
        self.resolve(table)?;
        Err(AdminError::unsupported(special("the tables in it have no secondary indexes")))
    }
}
