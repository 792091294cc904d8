//! Error types for administrative verbs
//!
//! This module defines:
//! - `AdminErrorKind`: machine-checkable classification of a failure
//! - `AdminError`: a kind plus a human-readable message
//!
//! Every administrative verb returns `AdminResult<T>`; nothing panics or
//! unwinds across the dispatcher boundary.

use serde::{Deserialize, Serialize};

/// Classification of an administrative failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminErrorKind {
    /// Database, table, index, user, or row absent
    NotFound,
    /// Mutation against the system database or a read-only table
    Protected,
    /// Operation not available for system tables
    Unsupported,
    /// The interruptor fired before the operation finished
    Interrupted,
    /// Raised by an external collaborator such as the real cluster interface
    /// or a metadata client, and passed through unmodified
    Forwarded,
    /// A table backend rejected a malformed value
    InvalidArgument,
    /// The user lacks the required permission
    PermissionDenied,
}

impl AdminErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AdminErrorKind::NotFound => "not_found",
            AdminErrorKind::Protected => "protected",
            AdminErrorKind::Unsupported => "unsupported",
            AdminErrorKind::Interrupted => "interrupted",
            AdminErrorKind::Forwarded => "forwarded",
            AdminErrorKind::InvalidArgument => "invalid_argument",
            AdminErrorKind::PermissionDenied => "permission_denied",
        }
    }
}

impl std::fmt::Display for AdminErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned by every administrative verb
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct AdminError {
    pub kind: AdminErrorKind,
    pub message: String,
}

pub type AdminResult<T> = Result<T, AdminError>;

impl AdminError {
    pub fn new(kind: AdminErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(AdminErrorKind::NotFound, message)
    }

    pub fn protected(message: impl Into<String>) -> Self {
        Self::new(AdminErrorKind::Protected, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(AdminErrorKind::Unsupported, message)
    }

    pub fn interrupted() -> Self {
        Self::new(AdminErrorKind::Interrupted, "The operation was interrupted.")
    }

    pub fn forwarded(message: impl Into<String>) -> Self {
        Self::new(AdminErrorKind::Forwarded, message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(AdminErrorKind::InvalidArgument, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(AdminErrorKind::PermissionDenied, message)
    }

    pub fn database_not_found(name: &str) -> Self {
        Self::not_found(format!("Database `{}` does not exist.", name))
    }

    pub fn table_not_found(db: &str, table: &str) -> Self {
        Self::not_found(format!("Table `{}.{}` does not exist.", db, table))
    }

    pub fn is(&self, kind: AdminErrorKind) -> bool {
        self.kind == kind
    }

    /// Structured form for clients that render error objects
    pub fn to_datum(&self) -> serde_json::Value {
        serde_json::json!({
            "kind": self.kind.as_str(),
            "message": self.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_error_display() {
        let err = AdminError::protected("Database `rethinkdb` is special.");
        assert_eq!(format!("{}", err), "Database `rethinkdb` is special.");
        assert!(err.is(AdminErrorKind::Protected));

        let err = AdminError::table_not_found("rethinkdb", "nope");
        assert_eq!(format!("{}", err), "Table `rethinkdb.nope` does not exist.");
        assert_eq!(err.kind, AdminErrorKind::NotFound);
    }

    #[test]
    fn test_interrupted() {
        let err = AdminError::interrupted();
        assert!(err.is(AdminErrorKind::Interrupted));
        assert!(!err.message.is_empty());
    }

    #[test]
    fn test_to_datum() {
        let err = AdminError::unsupported("no indexes");
        assert_eq!(
            err.to_datum(),
            serde_json::json!({"kind": "unsupported", "message": "no indexes"})
        );
    }

    #[test]
    fn test_kind_serde() {
        let json = serde_json::to_string(&AdminErrorKind::PermissionDenied).unwrap();
        assert_eq!(json, "\"permission_denied\"");
    }
}
