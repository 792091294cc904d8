//! Row access to a single system table

use async_trait::async_trait;

use sysdb_common::{
    AdminResult, Database, Datum, NameString, OperationContext, PermissionScope, TableId,
};
use sysdb_tables::{TableBackend, read_only};

use crate::cluster_interface::BaseTable;

/// Handle returned by `table_find` for a table of the system database
///
/// Permission and writability checks run on every call, since the handle
/// may outlive the call that produced it.
pub struct ArtificialTable {
    name: NameString,
    database: Database,
    backend: TableBackend,
}

impl ArtificialTable {
    pub fn new(name: NameString, backend: TableBackend) -> Self {
        Self {
            name,
            database: Database::system(),
            backend,
        }
    }

    pub fn backend(&self) -> &TableBackend {
        &self.backend
    }

    fn scope(&self) -> PermissionScope {
        PermissionScope::Database(self.database.id)
    }
}

#[async_trait]
impl BaseTable for ArtificialTable {
    fn name(&self) -> &NameString {
        &self.name
    }

    fn database(&self) -> &Database {
        &self.database
    }

    fn table_id(&self) -> Option<TableId> {
        None
    }

    fn primary_key(&self) -> &str {
        self.backend.primary_key()
    }

    async fn read_all(&self, ctx: &OperationContext) -> AdminResult<Vec<Datum>> {
        ctx.check_interrupted()?;
        ctx.user.require_read(self.scope())?;
        self.backend.read_all_rows(ctx).await
    }

    async fn read_row(&self, ctx: &OperationContext, pkey: &Datum) -> AdminResult<Option<Datum>> {
        ctx.check_interrupted()?;
        ctx.user.require_read(self.scope())?;
        self.backend.read_row(ctx, pkey).await
    }

    async fn write_row(
        &self,
        ctx: &OperationContext,
        pkey: &Datum,
        new_value: Option<Datum>,
    ) -> AdminResult<()> {
        ctx.check_interrupted()?;
        if !self.backend.capabilities().writable {
            return Err(read_only(self.name.as_str()));
        }
        ctx.user.require_write(self.scope())?;
        tracing::debug!(
            table = %self.name,
            delete = new_value.is_none(),
            "writing system table row"
        );
        self.backend.write_row(ctx, pkey, new_value).await
    }
}
