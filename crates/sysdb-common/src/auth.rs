//! User and permission model
//!
//! Permissions are tri-state at each scope: `Some(true)` grants,
//! `Some(false)` denies, `None` inherits from the enclosing scope
//! (table -> database -> global). Anything still unset is denied.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AdminError, AdminResult};
use crate::id::{DatabaseId, TableId};
use crate::name::Username;

/// Where a permission applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionScope {
    Global,
    Database(DatabaseId),
    Table(DatabaseId, TableId),
}

/// Permission kinds checked by administrative verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionAction {
    Read,
    Write,
    Config,
    Connect,
}

impl PermissionAction {
    pub fn as_str(self) -> &'static str {
        match self {
            PermissionAction::Read => "read",
            PermissionAction::Write => "write",
            PermissionAction::Config => "config",
            PermissionAction::Connect => "connect",
        }
    }
}

/// Permission flags at one scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Permissions {
    pub read: Option<bool>,
    pub write: Option<bool>,
    pub config: Option<bool>,
    pub connect: Option<bool>,
}

impl Permissions {
    pub fn all() -> Self {
        Self {
            read: Some(true),
            write: Some(true),
            config: Some(true),
            connect: Some(true),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.read.is_none()
            && self.write.is_none()
            && self.config.is_none()
            && self.connect.is_none()
    }

    pub fn get(&self, action: PermissionAction) -> Option<bool> {
        match action {
            PermissionAction::Read => self.read,
            PermissionAction::Write => self.write,
            PermissionAction::Config => self.config,
            PermissionAction::Connect => self.connect,
        }
    }

    /// Parse a complete permissions object, as stored in a `permissions` row
    pub fn from_datum(datum: &Value, global: bool) -> AdminResult<Self> {
        let mut permissions = Self::default();
        permissions.merge_datum(datum, global)?;
        Ok(permissions)
    }

    /// Merge the keys present in `datum`; `null` resets a key to inherit
    ///
    /// `connect` is only accepted when `global` is true.
    pub fn merge_datum(&mut self, datum: &Value, global: bool) -> AdminResult<()> {
        let obj = datum.as_object().ok_or_else(|| {
            AdminError::invalid(format!("Expected an object for permissions, got {}.", datum))
        })?;

        // Validate everything before touching `self` so a bad key leaves it unchanged
        let mut staged = *self;
        for (key, value) in obj {
            let flag = match value {
                Value::Bool(b) => Some(*b),
                Value::Null => None,
                other => {
                    return Err(AdminError::invalid(format!(
                        "Expected a boolean or null for `{}`, got {}.",
                        key, other
                    )));
                }
            };
            match key.as_str() {
                "read" => staged.read = flag,
                "write" => staged.write = flag,
                "config" => staged.config = flag,
                "connect" if global => staged.connect = flag,
                "connect" => {
                    return Err(AdminError::invalid(
                        "The `connect` permission is only valid at the global scope.",
                    ));
                }
                other => {
                    return Err(AdminError::invalid(format!(
                        "Unexpected key(s) `{}`.",
                        other
                    )));
                }
            }
        }
        *self = staged;
        Ok(())
    }

    /// Render as a JSON object, omitting unset keys
    pub fn to_datum(&self, global: bool) -> Value {
        let mut obj = Map::new();
        let mut put = |key: &str, flag: Option<bool>| {
            if let Some(b) = flag {
                obj.insert(key.to_string(), Value::Bool(b));
            }
        };
        put("read", self.read);
        put("write", self.write);
        put("config", self.config);
        if global {
            put("connect", self.connect);
        }
        Value::Object(obj)
    }
}

/// A user record in the auth metadata
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct User {
    pub password_hash: Option<String>,
    pub global: Permissions,
    pub databases: BTreeMap<DatabaseId, Permissions>,
    pub tables: BTreeMap<TableId, Permissions>,
}

impl User {
    pub fn with_password_hash(hash: Option<String>) -> Self {
        Self {
            password_hash: hash,
            ..Default::default()
        }
    }

    pub fn permissions_at(&self, scope: PermissionScope) -> Permissions {
        match scope {
            PermissionScope::Global => self.global,
            PermissionScope::Database(db) => self.databases.get(&db).copied().unwrap_or_default(),
            PermissionScope::Table(_, table) => {
                self.tables.get(&table).copied().unwrap_or_default()
            }
        }
    }

    /// Replace the permissions at `scope`, dropping empty entries
    pub fn set_permissions_at(&mut self, scope: PermissionScope, permissions: Permissions) {
        match scope {
            PermissionScope::Global => self.global = permissions,
            PermissionScope::Database(db) => {
                if permissions.is_empty() {
                    self.databases.remove(&db);
                } else {
                    self.databases.insert(db, permissions);
                }
            }
            PermissionScope::Table(_, table) => {
                if permissions.is_empty() {
                    self.tables.remove(&table);
                } else {
                    self.tables.insert(table, permissions);
                }
            }
        }
    }

    /// Effective permission after walking table -> database -> global
    pub fn is_allowed(&self, scope: PermissionScope, action: PermissionAction) -> bool {
        let table = match scope {
            PermissionScope::Table(_, table) => self.tables.get(&table).and_then(|p| p.get(action)),
            _ => None,
        };
        let database = match scope {
            PermissionScope::Table(db, _) | PermissionScope::Database(db) => {
                self.databases.get(&db).and_then(|p| p.get(action))
            }
            PermissionScope::Global => None,
        };
        table
            .or(database)
            .or(self.global.get(action))
            .unwrap_or(false)
    }
}

/// Users known to the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthMetadata {
    pub users: BTreeMap<Username, User>,
}

impl Default for AuthMetadata {
    /// A fresh cluster has exactly the `admin` user, without a password
    fn default() -> Self {
        let mut users = BTreeMap::new();
        users.insert(
            Username::admin(),
            User {
                password_hash: None,
                global: Permissions::all(),
                ..Default::default()
            },
        );
        Self { users }
    }
}

/// Identity of the caller of an administrative verb
#[derive(Debug, Clone)]
pub struct UserContext {
    kind: ContextKind,
}

#[derive(Debug, Clone)]
enum ContextKind {
    Internal,
    User { username: Username, record: User },
}

impl UserContext {
    /// A context that passes every permission check
    pub fn internal() -> Self {
        Self {
            kind: ContextKind::Internal,
        }
    }

    pub fn for_user(username: Username, record: User) -> Self {
        Self {
            kind: ContextKind::User { username, record },
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self.kind, ContextKind::Internal)
    }

    pub fn username(&self) -> Option<&Username> {
        match &self.kind {
            ContextKind::Internal => None,
            ContextKind::User { username, .. } => Some(username),
        }
    }

    pub fn require(&self, scope: PermissionScope, action: PermissionAction) -> AdminResult<()> {
        match &self.kind {
            ContextKind::Internal => Ok(()),
            ContextKind::User { username, .. } if username.is_admin() => Ok(()),
            ContextKind::User { username, record } => {
                if record.is_allowed(scope, action) {
                    Ok(())
                } else {
                    Err(AdminError::permission_denied(format!(
                        "User `{}` does not have the required `{}` permissions.",
                        username,
                        action.as_str()
                    )))
                }
            }
        }
    }

    pub fn require_read(&self, scope: PermissionScope) -> AdminResult<()> {
        self.require(scope, PermissionAction::Read)
    }

    pub fn require_write(&self, scope: PermissionScope) -> AdminResult<()> {
        self.require(scope, PermissionAction::Write)
    }

    pub fn require_config(&self, scope: PermissionScope) -> AdminResult<()> {
        self.require(scope, PermissionAction::Config)
    }
}
