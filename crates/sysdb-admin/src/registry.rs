//! Registry of the tables in the system database
//!
//! Maps each table name to the pair of backends that serve it, one rendering
//! identities by name and one by UUID. Built once and never modified.

use std::collections::{BTreeMap, BTreeSet};

use sysdb_common::{AdminError, AdminResult, IdentifierFormat, NameString};
use sysdb_tables::{Capabilities, SystemTableKind, TableBackend};

/// The two backends of one system table
#[derive(Debug, Clone)]
pub struct TableBackendEntry {
    pub table_name: NameString,
    pub by_name: TableBackend,
    pub by_uuid: TableBackend,
}

impl TableBackendEntry {
    pub fn kind(&self) -> SystemTableKind {
        self.by_name.kind()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.kind().capabilities()
    }
}

#[derive(Debug)]
pub struct BackendRegistry {
    entries: BTreeMap<NameString, TableBackendEntry>,
}

impl BackendRegistry {
    /// Build the registry from `(by_name, by_uuid)` backend pairs
    ///
    /// Every system table kind must appear exactly once. Both backends of a
    /// pair must be of the same kind; tables whose rows do not depend on the
    /// identifier format must use one instance for both.
    pub fn new(pairs: Vec<(TableBackend, TableBackend)>) -> AdminResult<Self> {
        let mut entries = BTreeMap::new();
        for (by_name, by_uuid) in pairs {
            let kind = by_name.kind();
            if by_uuid.kind() != kind {
                return Err(AdminError::invalid(format!(
                    "Backends of `{}` disagree on their table kind (`{}`).",
                    kind,
                    by_uuid.kind()
                )));
            }
            if kind.is_dual_format() == by_name.same_instance(&by_uuid) {
                return Err(AdminError::invalid(format!(
                    "Table `{}` must use {} backend instance per identifier format.",
                    kind,
                    if kind.is_dual_format() { "one" } else { "the same" }
                )));
            }
            let table_name = NameString::new(kind.name()).map_err(AdminError::invalid)?;
            let entry = TableBackendEntry {
                table_name: table_name.clone(),
                by_name,
                by_uuid,
            };
            if entries.insert(table_name, entry).is_some() {
                return Err(AdminError::invalid(format!(
                    "Table `{}` is registered twice.",
                    kind
                )));
            }
        }

        let missing: Vec<&str> = SystemTableKind::ALL
            .iter()
            .map(|kind| kind.name())
            .filter(|name| !entries.keys().any(|n| n.as_str() == *name))
            .collect();
        if !missing.is_empty() {
            return Err(AdminError::invalid(format!(
                "Missing backends for `{}`.",
                missing.join("`, `")
            )));
        }
        Ok(Self { entries })
    }

    pub fn resolve(&self, name: &NameString) -> Option<&TableBackendEntry> {
        self.entries.get(name)
    }

    /// Names of every system table; fixed for a given build
    pub fn list_names(&self) -> BTreeSet<NameString> {
        self.entries.keys().cloned().collect()
    }

    pub fn select(entry: &TableBackendEntry, format: IdentifierFormat) -> &TableBackend {
        match format {
            IdentifierFormat::Name => &entry.by_name,
            IdentifierFormat::Uuid => &entry.by_uuid,
        }
    }

    pub fn capabilities(&self, name: &NameString) -> Option<Capabilities> {
        self.resolve(name).map(TableBackendEntry::capabilities)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &TableBackendEntry> {
        self.entries.values()
    }
}
