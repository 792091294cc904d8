//! Rendering of entity identities as names or UUIDs
//!
//! Dual-format tables mention databases, tables and servers inside their rows.
//! An `IdentityRenderer` is built from a metadata snapshot at the start of each
//! call and renders those references according to the table's
//! `IdentifierFormat`; it also resolves references found in written rows.

use std::collections::BTreeMap;

use serde_json::Value;

use sysdb_common::{
    AdminError, AdminResult, DatabaseId, Datum, IdentifierFormat, NameString, ServerId, TableId,
    system_database_id,
};
use sysdb_metadata::{ClusterMetadata, DirectorySnapshot, TableBasicConfig};

use crate::datum::{expect_name, expect_uuid};

#[derive(Debug, Clone)]
pub struct IdentityRenderer {
    format: IdentifierFormat,
    databases: BTreeMap<DatabaseId, NameString>,
    tables: BTreeMap<TableId, (DatabaseId, NameString)>,
    servers: BTreeMap<ServerId, NameString>,
}

impl IdentityRenderer {
    pub fn new(format: IdentifierFormat) -> Self {
        let mut databases = BTreeMap::new();
        databases.insert(system_database_id(), NameString::system_database());
        Self {
            format,
            databases,
            tables: BTreeMap::new(),
            servers: BTreeMap::new(),
        }
    }

    pub fn format(&self) -> IdentifierFormat {
        self.format
    }

    pub fn with_databases(mut self, cluster: &ClusterMetadata) -> Self {
        self.databases.extend(
            cluster
                .databases
                .iter()
                .map(|(id, config)| (*id, config.name.clone())),
        );
        self
    }

    pub fn with_tables(mut self, tables: &BTreeMap<TableId, TableBasicConfig>) -> Self {
        self.tables.extend(
            tables
                .iter()
                .map(|(id, basic)| (*id, (basic.database, basic.name.clone()))),
        );
        self
    }

    pub fn with_servers(mut self, servers: BTreeMap<ServerId, NameString>) -> Self {
        self.servers.extend(servers);
        self
    }

    pub fn database(&self, id: &DatabaseId) -> Datum {
        Value::String(self.label(id.to_string(), self.databases.get(id)))
    }

    pub fn table(&self, id: &TableId) -> Datum {
        Value::String(self.label(id.to_string(), self.tables.get(id).map(|(_, name)| name)))
    }

    pub fn server(&self, id: &ServerId) -> Datum {
        Value::String(self.server_label(id))
    }

    /// Server reference usable as an object key
    pub fn server_label(&self, id: &ServerId) -> String {
        self.label(id.to_string(), self.servers.get(id))
    }

    /// Database a table belongs to, if the table is known
    pub fn table_database(&self, id: &TableId) -> Option<DatabaseId> {
        self.tables.get(id).map(|(db, _)| *db)
    }

    pub fn parse_database(&self, value: &Value, key: &str) -> AdminResult<DatabaseId> {
        match self.format {
            IdentifierFormat::Uuid => {
                let id = DatabaseId::from_uuid(expect_uuid(value, key)?);
                if self.databases.contains_key(&id) {
                    Ok(id)
                } else {
                    Err(AdminError::not_found(format!(
                        "Database `{}` does not exist.",
                        id
                    )))
                }
            }
            IdentifierFormat::Name => {
                let name = expect_name(value, key)?;
                unique(
                    self.databases
                        .iter()
                        .filter(|(_, n)| **n == name)
                        .map(|(id, _)| *id),
                    "Database",
                    &name,
                )
            }
        }
    }

    /// Resolve a table reference; by name it is looked up inside `db`
    pub fn parse_table(&self, db: DatabaseId, value: &Value, key: &str) -> AdminResult<TableId> {
        match self.format {
            IdentifierFormat::Uuid => {
                let id = TableId::from_uuid(expect_uuid(value, key)?);
                match self.tables.get(&id) {
                    Some((owner, _)) if *owner == db => Ok(id),
                    _ => Err(AdminError::not_found(format!("Table `{}` does not exist.", id))),
                }
            }
            IdentifierFormat::Name => {
                let name = expect_name(value, key)?;
                unique(
                    self.tables
                        .iter()
                        .filter(|(_, (owner, n))| *owner == db && *n == name)
                        .map(|(id, _)| *id),
                    "Table",
                    &name,
                )
            }
        }
    }

    pub fn parse_server(&self, value: &Value, key: &str) -> AdminResult<ServerId> {
        match self.format {
            IdentifierFormat::Uuid => {
                let id = ServerId::from_uuid(expect_uuid(value, key)?);
                if self.servers.contains_key(&id) {
                    Ok(id)
                } else {
                    Err(AdminError::not_found(format!("Server `{}` does not exist.", id)))
                }
            }
            IdentifierFormat::Name => {
                let name = expect_name(value, key)?;
                unique(
                    self.servers
                        .iter()
                        .filter(|(_, n)| **n == name)
                        .map(|(id, _)| *id),
                    "Server",
                    &name,
                )
            }
        }
    }

    fn label(&self, uuid: String, name: Option<&NameString>) -> String {
        match (self.format, name) {
            (IdentifierFormat::Name, Some(name)) => name.to_string(),
            // Entities deleted since the row was computed fall back to their UUID
            _ => uuid,
        }
    }
}

/// Server names as published in the directory
pub fn directory_server_names(snapshot: &DirectorySnapshot) -> BTreeMap<ServerId, NameString> {
    snapshot
        .values()
        .map(|metadata| (metadata.server_id, metadata.server_name.clone()))
        .collect()
}

fn unique<I, Id>(mut matches: I, what: &str, name: &NameString) -> AdminResult<Id>
where
    I: Iterator<Item = Id>,
{
    match (matches.next(), matches.next()) {
        (Some(id), None) => Ok(id),
        (None, _) => Err(AdminError::not_found(format!(
            "{} `{}` does not exist.",
            what, name
        ))),
        (Some(_), Some(_)) => Err(AdminError::invalid(format!(
            "{} `{}` is ambiguous; there are multiple entities with that name.",
            what, name
        ))),
    }
}
