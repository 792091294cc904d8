//! Sysdb Common - Shared types for the administrative query layer
//!
//! This crate provides the foundational types used across all sysdb components:
//! - Validated names and UUID identifiers
//! - The identifier format selecting name or UUID rendering
//! - Error kinds surfaced by every administrative verb
//! - The user/permission model and per-call operation context

pub mod auth;
pub mod context;
pub mod error;
pub mod format;
pub mod id;
pub mod macros;
pub mod name;

// Re-exports for convenience
pub use auth::{AuthMetadata, PermissionAction, PermissionScope, Permissions, User, UserContext};
pub use context::{Interruptor, OperationContext};
pub use error::{AdminError, AdminErrorKind, AdminResult};
pub use format::IdentifierFormat;
pub use id::{DatabaseId, PeerId, ServerId, TableId};
pub use name::{NameString, Username};

/// Structured value returned by administrative verbs and stored in system tables
pub type Datum = serde_json::Value;

/// Name of the reserved database that hosts every artificial table
pub const SYSTEM_DATABASE_NAME: &str = "rethinkdb";

/// Name of the user that always exists and cannot lose its permissions
pub const ADMIN_USERNAME: &str = "admin";

/// Primary key used by every artificial table
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Fixed identity of the system database
pub fn system_database_id() -> DatabaseId {
    DatabaseId::nil()
}

/// A database as seen by the query engine: its identity and current name
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Database {
    pub id: DatabaseId,
    pub name: NameString,
}

impl Database {
    pub fn new(id: DatabaseId, name: NameString) -> Self {
        Self { id, name }
    }

    /// The built-in system database
    pub fn system() -> Self {
        Self {
            id: system_database_id(),
            name: NameString::system_database(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.name.is_system_database()
    }
}
