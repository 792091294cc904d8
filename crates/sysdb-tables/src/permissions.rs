//! `rethinkdb.permissions`
//!
//! One row per user and scope that carries explicit permissions. The primary
//! key is `[user]` for global permissions, `[user, db]` for a database and
//! `[user, db, table]` for a table.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use sysdb_common::{
    AdminError, AdminResult, AuthMetadata, Datum, IdentifierFormat, OperationContext,
    PermissionScope, Permissions, Username,
};
use sysdb_metadata::{ClusterMetadata, SemilatticeView, TableMetaClient};

use crate::backend::ArtificialTableBackend;
use crate::datum::{as_object, check_keys, check_primary_key, expect_str, require};
use crate::render::IdentityRenderer;

pub struct PermissionsBackend {
    format: IdentifierFormat,
    auth_view: Arc<SemilatticeView<AuthMetadata>>,
    cluster_view: Arc<SemilatticeView<ClusterMetadata>>,
    table_meta: Arc<dyn TableMetaClient>,
}

impl PermissionsBackend {
    pub fn new(
        format: IdentifierFormat,
        auth_view: Arc<SemilatticeView<AuthMetadata>>,
        cluster_view: Arc<SemilatticeView<ClusterMetadata>>,
        table_meta: Arc<dyn TableMetaClient>,
    ) -> Self {
        Self {
            format,
            auth_view,
            cluster_view,
            table_meta,
        }
    }

    /// Merge `permissions` into the user's permissions at `scope`
    ///
    /// Returns the `{granted, permissions_changes}` summary of the change.
    pub fn grant(
        &self,
        username: &Username,
        scope: PermissionScope,
        permissions: &Datum,
    ) -> AdminResult<Datum> {
        if username.is_admin() {
            return Err(admin_is_fixed());
        }
        let global = scope == PermissionScope::Global;
        let (old, new) = self.auth_view.try_apply(|auth| {
            let user = auth
                .users
                .get_mut(username)
                .ok_or_else(|| user_not_found(username))?;
            let old = user.permissions_at(scope);
            let mut new = old;
            new.merge_datum(permissions, global)?;
            user.set_permissions_at(scope, new);
            Ok::<_, AdminError>((old, new))
        })?;
        tracing::info!(user = %username, ?scope, "granted permissions");

        let render = |p: Permissions| {
            if p.is_empty() {
                Value::Null
            } else {
                p.to_datum(global)
            }
        };
        Ok(json!({
            "granted": 1,
            "permissions_changes": [{
                "old_val": render(old),
                "new_val": render(new),
            }],
        }))
    }

    async fn renderer(&self) -> IdentityRenderer {
        let tables = self.table_meta.list_tables().await;
        let renderer = self
            .cluster_view
            .read(|cluster| IdentityRenderer::new(self.format).with_databases(cluster));
        renderer.with_tables(&tables)
    }

    fn parse_key(
        &self,
        renderer: &IdentityRenderer,
        pkey: &Datum,
    ) -> AdminResult<(Username, PermissionScope)> {
        let parts = pkey
            .as_array()
            .filter(|parts| (1..=3).contains(&parts.len()))
            .ok_or_else(|| {
                AdminError::invalid(format!(
                    "Expected an array of one to three strings as the primary key, got {}.",
                    pkey
                ))
            })?;
        let username = Username::new(expect_str(&parts[0], "user")?).map_err(AdminError::invalid)?;
        let scope = match parts.len() {
            1 => PermissionScope::Global,
            2 => PermissionScope::Database(renderer.parse_database(&parts[1], "database")?),
            _ => {
                let db = renderer.parse_database(&parts[1], "database")?;
                PermissionScope::Table(db, renderer.parse_table(db, &parts[2], "table")?)
            }
        };
        Ok((username, scope))
    }
}

fn user_not_found(username: &Username) -> AdminError {
    AdminError::not_found(format!("User `{}` does not exist.", username))
}

fn admin_is_fixed() -> AdminError {
    AdminError::invalid("The permissions of the user `admin` can't be modified.")
}

fn rows(auth: &AuthMetadata, renderer: &IdentityRenderer) -> Vec<Datum> {
    let mut rows = Vec::new();
    for (username, user) in &auth.users {
        let name = username.as_str();
        if !user.global.is_empty() {
            rows.push(json!({
                "id": [name],
                "user": name,
                "permissions": user.global.to_datum(true),
            }));
        }
        for (db, permissions) in &user.databases {
            let db = renderer.database(db);
            rows.push(json!({
                "id": [name, db],
                "user": name,
                "database": db,
                "permissions": permissions.to_datum(false),
            }));
        }
        for (table, permissions) in &user.tables {
            // Grants on dropped tables linger until the user is next edited
            let Some(db) = renderer.table_database(table) else {
                continue;
            };
            let db = renderer.database(&db);
            let table = renderer.table(table);
            rows.push(json!({
                "id": [name, db, table],
                "user": name,
                "database": db,
                "table": table,
                "permissions": permissions.to_datum(false),
            }));
        }
    }
    rows
}

#[async_trait]
impl ArtificialTableBackend for PermissionsBackend {
    async fn read_all_rows(&self, ctx: &OperationContext) -> AdminResult<Vec<Datum>> {
        ctx.check_interrupted()?;
        let renderer = self.renderer().await;
        Ok(self.auth_view.read(|auth| rows(auth, &renderer)))
    }

    async fn write_row(
        &self,
        ctx: &OperationContext,
        pkey: &Datum,
        new_value: Option<Datum>,
    ) -> AdminResult<()> {
        ctx.check_interrupted()?;
        let renderer = self.renderer().await;
        let (username, scope) = self.parse_key(&renderer, pkey)?;
        if username.is_admin() {
            return Err(admin_is_fixed());
        }

        let permissions = match &new_value {
            None => Permissions::default(),
            Some(row) => {
                let obj = as_object(row)?;
                check_keys(obj, &["id", "user", "database", "table", "permissions"])?;
                check_primary_key(obj, pkey)?;
                for (index, key) in ["user", "database", "table"].into_iter().enumerate() {
                    if let Some(value) = obj.get(key) {
                        if pkey.get(index) != Some(value) {
                            return Err(AdminError::invalid(format!(
                                "The `{}` field must match the primary key.",
                                key
                            )));
                        }
                    }
                }
                Permissions::from_datum(
                    require(obj, "permissions")?,
                    scope == PermissionScope::Global,
                )?
            }
        };

        self.auth_view.try_apply(|auth| {
            let user = auth
                .users
                .get_mut(&username)
                .ok_or_else(|| user_not_found(&username))?;
            user.set_permissions_at(scope, permissions);
            Ok(())
        })
    }
}
