//! Table backend contract and the closed set of system tables

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use sysdb_common::{
    AdminError, AdminResult, DEFAULT_PRIMARY_KEY, Datum, OperationContext, SYSTEM_DATABASE_NAME,
};

use crate::cluster_config::ClusterConfigBackend;
use crate::datum::row_id;
use crate::db_config::DbConfigBackend;
use crate::debug::{DebugScratchBackend, DebugStatsBackend, DebugTableStatusBackend};
use crate::issues::IssuesBackend;
use crate::jobs::JobsBackend;
use crate::logs::LogsBackend;
use crate::permissions::PermissionsBackend;
use crate::server_config::ServerConfigBackend;
use crate::server_status::ServerStatusBackend;
use crate::stats::StatsBackend;
use crate::table_config::TableConfigBackend;
use crate::table_status::TableStatusBackend;
use crate::users::UsersBackend;

/// Storage contract of one artificial table
#[async_trait]
pub trait ArtificialTableBackend: Send + Sync {
    fn primary_key(&self) -> &'static str {
        DEFAULT_PRIMARY_KEY
    }

    /// Every row, in a stable order
    async fn read_all_rows(&self, ctx: &OperationContext) -> AdminResult<Vec<Datum>>;

    async fn read_row(&self, ctx: &OperationContext, pkey: &Datum) -> AdminResult<Option<Datum>> {
        let rows = self.read_all_rows(ctx).await?;
        Ok(rows.into_iter().find(|row| row_id(row) == Some(pkey)))
    }

    /// Replace the row at `pkey`; `None` deletes it
    async fn write_row(
        &self,
        ctx: &OperationContext,
        pkey: &Datum,
        new_value: Option<Datum>,
    ) -> AdminResult<()>;
}

/// Which writes a table accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    ReadOnly,
    ReadWrite,
    /// Existing rows may change; rows cannot be inserted or deleted
    UpdateOnly,
    /// Rows may only be deleted
    DeleteOnly,
}

impl WritePolicy {
    /// Reject a write that this policy does not allow
    ///
    /// `exists` tells whether a row is currently stored at the written key.
    pub fn check(
        self,
        table: &str,
        exists: bool,
        new_value: Option<&Datum>,
    ) -> AdminResult<()> {
        match (self, new_value) {
            (WritePolicy::ReadOnly, _) => Err(read_only(table)),
            (WritePolicy::ReadWrite, _) => Ok(()),
            (WritePolicy::UpdateOnly, None) => Err(AdminError::invalid(format!(
                "It's illegal to delete rows from the `{}.{}` table.",
                SYSTEM_DATABASE_NAME, table
            ))),
            (WritePolicy::UpdateOnly, Some(_)) if !exists => Err(AdminError::invalid(format!(
                "It's illegal to insert new rows into the `{}.{}` table.",
                SYSTEM_DATABASE_NAME, table
            ))),
            (WritePolicy::UpdateOnly, Some(_)) => Ok(()),
            (WritePolicy::DeleteOnly, None) => Ok(()),
            (WritePolicy::DeleteOnly, Some(_)) => Err(AdminError::invalid(format!(
                "It's illegal to write to the `{}.{}` table; rows can only be deleted.",
                SYSTEM_DATABASE_NAME, table
            ))),
        }
    }
}

pub fn read_only(table: &str) -> AdminError {
    AdminError::protected(format!(
        "Table `{}.{}` is read-only.",
        SYSTEM_DATABASE_NAME, table
    ))
}

/// Fixed capability flags of a table kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub readable: bool,
    pub writable: bool,
    pub supports_secondary_index: bool,
    pub supports_config: bool,
    pub supports_status: bool,
    pub write_policy: WritePolicy,
}

impl Capabilities {
    const fn new(write_policy: WritePolicy, config_and_status: bool) -> Self {
        Self {
            readable: true,
            writable: !matches!(write_policy, WritePolicy::ReadOnly),
            supports_secondary_index: false,
            supports_config: config_and_status,
            supports_status: config_and_status,
            write_policy,
        }
    }
}

/// Every table in the system database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SystemTableKind {
    Permissions,
    Users,
    ClusterConfig,
    DbConfig,
    Issues,
    Logs,
    ServerConfig,
    ServerStatus,
    Stats,
    TableConfig,
    TableStatus,
    Jobs,
    DebugScratch,
    DebugStats,
    DebugTableStatus,
}

impl SystemTableKind {
    pub const ALL: [SystemTableKind; 15] = [
        SystemTableKind::Permissions,
        SystemTableKind::Users,
        SystemTableKind::ClusterConfig,
        SystemTableKind::DbConfig,
        SystemTableKind::Issues,
        SystemTableKind::Logs,
        SystemTableKind::ServerConfig,
        SystemTableKind::ServerStatus,
        SystemTableKind::Stats,
        SystemTableKind::TableConfig,
        SystemTableKind::TableStatus,
        SystemTableKind::Jobs,
        SystemTableKind::DebugScratch,
        SystemTableKind::DebugStats,
        SystemTableKind::DebugTableStatus,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SystemTableKind::Permissions => "permissions",
            SystemTableKind::Users => "users",
            SystemTableKind::ClusterConfig => "cluster_config",
            SystemTableKind::DbConfig => "db_config",
            SystemTableKind::Issues => "issues",
            SystemTableKind::Logs => "logs",
            SystemTableKind::ServerConfig => "server_config",
            SystemTableKind::ServerStatus => "server_status",
            SystemTableKind::Stats => "stats",
            SystemTableKind::TableConfig => "table_config",
            SystemTableKind::TableStatus => "table_status",
            SystemTableKind::Jobs => "jobs",
            SystemTableKind::DebugScratch => "_debug_scratch",
            SystemTableKind::DebugStats => "_debug_stats",
            SystemTableKind::DebugTableStatus => "_debug_table_status",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Whether rows mention other entities, so name and UUID renderings differ
    pub fn is_dual_format(self) -> bool {
        matches!(
            self,
            SystemTableKind::Permissions
                | SystemTableKind::Issues
                | SystemTableKind::Logs
                | SystemTableKind::ServerStatus
                | SystemTableKind::Stats
                | SystemTableKind::TableConfig
                | SystemTableKind::TableStatus
                | SystemTableKind::Jobs
        )
    }

    pub fn capabilities(self) -> Capabilities {
        use WritePolicy::*;
        match self {
            SystemTableKind::Permissions => Capabilities::new(ReadWrite, true),
            SystemTableKind::Users => Capabilities::new(ReadWrite, true),
            SystemTableKind::ClusterConfig => Capabilities::new(UpdateOnly, true),
            SystemTableKind::DbConfig => Capabilities::new(ReadWrite, true),
            SystemTableKind::Issues => Capabilities::new(ReadOnly, true),
            SystemTableKind::Logs => Capabilities::new(ReadOnly, true),
            SystemTableKind::ServerConfig => Capabilities::new(UpdateOnly, true),
            SystemTableKind::ServerStatus => Capabilities::new(ReadOnly, true),
            SystemTableKind::Stats => Capabilities::new(ReadOnly, true),
            SystemTableKind::TableConfig => Capabilities::new(ReadWrite, true),
            SystemTableKind::TableStatus => Capabilities::new(ReadOnly, true),
            SystemTableKind::Jobs => Capabilities::new(DeleteOnly, true),
            SystemTableKind::DebugScratch => Capabilities::new(ReadWrite, false),
            SystemTableKind::DebugStats => Capabilities::new(ReadOnly, false),
            SystemTableKind::DebugTableStatus => Capabilities::new(ReadOnly, false),
        }
    }
}

impl fmt::Display for SystemTableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Handle to one concrete backend instance
#[derive(Clone)]
pub enum TableBackend {
    Permissions(Arc<PermissionsBackend>),
    Users(Arc<UsersBackend>),
    ClusterConfig(Arc<ClusterConfigBackend>),
    DbConfig(Arc<DbConfigBackend>),
    Issues(Arc<IssuesBackend>),
    Logs(Arc<LogsBackend>),
    ServerConfig(Arc<ServerConfigBackend>),
    ServerStatus(Arc<ServerStatusBackend>),
    Stats(Arc<StatsBackend>),
    TableConfig(Arc<TableConfigBackend>),
    TableStatus(Arc<TableStatusBackend>),
    Jobs(Arc<JobsBackend>),
    DebugScratch(Arc<DebugScratchBackend>),
    DebugStats(Arc<DebugStatsBackend>),
    DebugTableStatus(Arc<DebugTableStatusBackend>),
}

impl TableBackend {
    pub fn kind(&self) -> SystemTableKind {
        match self {
            TableBackend::Permissions(_) => SystemTableKind::Permissions,
            TableBackend::Users(_) => SystemTableKind::Users,
            TableBackend::ClusterConfig(_) => SystemTableKind::ClusterConfig,
            TableBackend::DbConfig(_) => SystemTableKind::DbConfig,
            TableBackend::Issues(_) => SystemTableKind::Issues,
            TableBackend::Logs(_) => SystemTableKind::Logs,
            TableBackend::ServerConfig(_) => SystemTableKind::ServerConfig,
            TableBackend::ServerStatus(_) => SystemTableKind::ServerStatus,
            TableBackend::Stats(_) => SystemTableKind::Stats,
            TableBackend::TableConfig(_) => SystemTableKind::TableConfig,
            TableBackend::TableStatus(_) => SystemTableKind::TableStatus,
            TableBackend::Jobs(_) => SystemTableKind::Jobs,
            TableBackend::DebugScratch(_) => SystemTableKind::DebugScratch,
            TableBackend::DebugStats(_) => SystemTableKind::DebugStats,
            TableBackend::DebugTableStatus(_) => SystemTableKind::DebugTableStatus,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.kind().capabilities()
    }

    fn inner(&self) -> &dyn ArtificialTableBackend {
        match self {
            TableBackend::Permissions(b) => b.as_ref(),
            TableBackend::Users(b) => b.as_ref(),
            TableBackend::ClusterConfig(b) => b.as_ref(),
            TableBackend::DbConfig(b) => b.as_ref(),
            TableBackend::Issues(b) => b.as_ref(),
            TableBackend::Logs(b) => b.as_ref(),
            TableBackend::ServerConfig(b) => b.as_ref(),
            TableBackend::ServerStatus(b) => b.as_ref(),
            TableBackend::Stats(b) => b.as_ref(),
            TableBackend::TableConfig(b) => b.as_ref(),
            TableBackend::TableStatus(b) => b.as_ref(),
            TableBackend::Jobs(b) => b.as_ref(),
            TableBackend::DebugScratch(b) => b.as_ref(),
            TableBackend::DebugStats(b) => b.as_ref(),
            TableBackend::DebugTableStatus(b) => b.as_ref(),
        }
    }

    pub fn primary_key(&self) -> &'static str {
        self.inner().primary_key()
    }

    pub async fn read_all_rows(&self, ctx: &OperationContext) -> AdminResult<Vec<Datum>> {
        self.inner().read_all_rows(ctx).await
    }

    pub async fn read_row(
        &self,
        ctx: &OperationContext,
        pkey: &Datum,
    ) -> AdminResult<Option<Datum>> {
        self.inner().read_row(ctx, pkey).await
    }

    pub async fn write_row(
        &self,
        ctx: &OperationContext,
        pkey: &Datum,
        new_value: Option<Datum>,
    ) -> AdminResult<()> {
        self.inner().write_row(ctx, pkey, new_value).await
    }

    /// Whether both handles point at the same backend instance
    pub fn same_instance(&self, other: &TableBackend) -> bool {
        std::ptr::addr_eq(
            self.inner() as *const dyn ArtificialTableBackend,
            other.inner() as *const dyn ArtificialTableBackend,
        )
    }
}

impl fmt::Debug for TableBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TableBackend").field(&self.kind()).finish()
    }
}
