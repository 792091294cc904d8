//! The administrative verb set
//!
//! [`ClusterInterface`] is implemented both by the real cluster interface and
//! by the dispatcher that serves the system database in front of it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;

use sysdb_common::{
    AdminResult, Database, Datum, IdentifierFormat, NameString, OperationContext, TableId,
    Username,
};
use sysdb_metadata::{TableReadiness, WriteDurability};

use crate::params::{
    EmergencyRepairMode, ModifierConfig, SindexConfig, SindexStatus, TableGenerateConfigParams,
};

/// Rows of a config or status table, scoped to one database or table
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Name of the table the rows come from
    pub table: NameString,
    pub rows: Vec<Datum>,
    /// Whether writes through this selection are accepted
    pub writable: bool,
}

/// Row-level access to one table
#[async_trait]
pub trait BaseTable: Send + Sync {
    fn name(&self) -> &NameString;

    fn database(&self) -> &Database;

    /// Identity of the table in cluster metadata; `None` for system tables
    fn table_id(&self) -> Option<TableId>;

    fn primary_key(&self) -> &str;

    async fn read_all(&self, ctx: &OperationContext) -> AdminResult<Vec<Datum>>;

    async fn read_row(&self, ctx: &OperationContext, pkey: &Datum) -> AdminResult<Option<Datum>>;

    /// Replace the row at `pkey`; `None` deletes it
    async fn write_row(
        &self,
        ctx: &OperationContext,
        pkey: &Datum,
        new_value: Option<Datum>,
    ) -> AdminResult<()>;
}

/// Every administrative operation the query engine can issue
#[async_trait]
pub trait ClusterInterface: Send + Sync {
    async fn db_create(&self, ctx: &OperationContext, name: &NameString) -> AdminResult<Datum>;

    async fn db_drop(&self, ctx: &OperationContext, name: &NameString) -> AdminResult<Datum>;

    async fn db_list(&self, ctx: &OperationContext) -> AdminResult<BTreeSet<NameString>>;

    async fn db_find(&self, ctx: &OperationContext, name: &NameString) -> AdminResult<Database>;

    async fn db_config(&self, ctx: &OperationContext, db: &Database) -> AdminResult<Selection>;

    async fn table_create(
        &self,
        ctx: &OperationContext,
        name: &NameString,
        db: &Database,
        params: &TableGenerateConfigParams,
        primary_key: &str,
        durability: WriteDurability,
    ) -> AdminResult<Datum>;

    async fn table_drop(
        &self,
        ctx: &OperationContext,
        name: &NameString,
        db: &Database,
    ) -> AdminResult<Datum>;

    async fn table_list(
        &self,
        ctx: &OperationContext,
        db: &Database,
    ) -> AdminResult<BTreeSet<NameString>>;

    async fn table_find(
        &self,
        ctx: &OperationContext,
        name: &NameString,
        db: &Database,
        format: Option<IdentifierFormat>,
    ) -> AdminResult<Arc<dyn BaseTable>>;

    async fn table_estimate_doc_counts(
        &self,
        ctx: &OperationContext,
        db: &Database,
        name: &NameString,
    ) -> AdminResult<Vec<u64>>;

    async fn table_config(
        &self,
        ctx: &OperationContext,
        db: &Database,
        name: &NameString,
        format: Option<IdentifierFormat>,
    ) -> AdminResult<Selection>;

    async fn table_status(
        &self,
        ctx: &OperationContext,
        db: &Database,
        name: &NameString,
        format: Option<IdentifierFormat>,
    ) -> AdminResult<Selection>;

    /// Wait until the table reaches `readiness`
    async fn table_wait(
        &self,
        ctx: &OperationContext,
        db: &Database,
        name: &NameString,
        readiness: TableReadiness,
    ) -> AdminResult<Datum>;

    /// Wait until every table of the database reaches `readiness`
    async fn db_wait(
        &self,
        ctx: &OperationContext,
        db: &Database,
        readiness: TableReadiness,
    ) -> AdminResult<Datum>;

    async fn table_reconfigure(
        &self,
        ctx: &OperationContext,
        db: &Database,
        name: &NameString,
        params: &TableGenerateConfigParams,
        dry_run: bool,
    ) -> AdminResult<Datum>;

    async fn db_reconfigure(
        &self,
        ctx: &OperationContext,
        db: &Database,
        params: &TableGenerateConfigParams,
        dry_run: bool,
    ) -> AdminResult<Datum>;

    async fn table_emergency_repair(
        &self,
        ctx: &OperationContext,
        db: &Database,
        name: &NameString,
        mode: EmergencyRepairMode,
        dry_run: bool,
    ) -> AdminResult<Datum>;

    async fn table_rebalance(
        &self,
        ctx: &OperationContext,
        db: &Database,
        name: &NameString,
    ) -> AdminResult<Datum>;

    async fn db_rebalance(&self, ctx: &OperationContext, db: &Database) -> AdminResult<Datum>;

    async fn grant_global(
        &self,
        ctx: &OperationContext,
        username: &Username,
        permissions: &Datum,
    ) -> AdminResult<Datum>;

    async fn grant_database(
        &self,
        ctx: &OperationContext,
        db: &NameString,
        username: &Username,
        permissions: &Datum,
    ) -> AdminResult<Datum>;

    async fn grant_table(
        &self,
        ctx: &OperationContext,
        db: &NameString,
        table: &NameString,
        username: &Username,
        permissions: &Datum,
    ) -> AdminResult<Datum>;

    async fn modifier_create(
        &self,
        ctx: &OperationContext,
        db: &Database,
        table: &NameString,
        config: &ModifierConfig,
    ) -> AdminResult<()>;

    async fn modifier_drop(
        &self,
        ctx: &OperationContext,
        db: &Database,
        table: &NameString,
    ) -> AdminResult<()>;

    async fn sindex_create(
        &self,
        ctx: &OperationContext,
        db: &Database,
        table: &NameString,
        name: &str,
        config: &SindexConfig,
    ) -> AdminResult<()>;

    async fn sindex_drop(
        &self,
        ctx: &OperationContext,
        db: &Database,
        table: &NameString,
        name: &str,
    ) -> AdminResult<()>;

    async fn sindex_rename(
        &self,
        ctx: &OperationContext,
        db: &Database,
        table: &NameString,
        name: &str,
        new_name: &str,
        overwrite: bool,
    ) -> AdminResult<()>;

    async fn sindex_list(
        &self,
        ctx: &OperationContext,
        db: &Database,
        table: &NameString,
    ) -> AdminResult<BTreeMap<String, (SindexConfig, SindexStatus)>>;
}
