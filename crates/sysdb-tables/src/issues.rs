//! `rethinkdb.issues`
//!
//! Problems detected from the current metadata: name collisions between
//! databases, tables or servers, and configured servers that are not
//! connected. Each issue's id is derived from its content, so the same
//! problem keeps the same id across reads.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use sysdb_common::{AdminResult, Datum, IdentifierFormat, OperationContext};
use sysdb_metadata::{
    ClusterMetadata, DirectorySnapshot, SemilatticeView, ServerConfigClient, TableMetaClient,
    Watchable, by_server,
};

use crate::backend::{ArtificialTableBackend, SystemTableKind, read_only};
use crate::render::{IdentityRenderer, directory_server_names};

const ISSUE_ID_NAMESPACE: Uuid = Uuid::from_u128(0x8a3f_61d2_4c0e_4b7a_9e15_2d6c_b0f4_7e93);

struct Issue {
    kind: &'static str,
    critical: bool,
    description: String,
    info: Datum,
    /// Format-independent identity of the problem
    key: String,
}

impl Issue {
    fn into_row(self) -> Datum {
        let id = Uuid::new_v5(
            &ISSUE_ID_NAMESPACE,
            format!("{}:{}", self.kind, self.key).as_bytes(),
        );
        json!({
            "id": id.to_string(),
            "type": self.kind,
            "critical": self.critical,
            "description": self.description,
            "info": self.info,
        })
    }
}

pub struct IssuesBackend {
    format: IdentifierFormat,
    cluster_view: Arc<SemilatticeView<ClusterMetadata>>,
    table_meta: Arc<dyn TableMetaClient>,
    server_config: Arc<dyn ServerConfigClient>,
    directory_view: Arc<dyn Watchable<DirectorySnapshot>>,
}

impl IssuesBackend {
    pub fn new(
        format: IdentifierFormat,
        cluster_view: Arc<SemilatticeView<ClusterMetadata>>,
        table_meta: Arc<dyn TableMetaClient>,
        server_config: Arc<dyn ServerConfigClient>,
        directory_view: Arc<dyn Watchable<DirectorySnapshot>>,
    ) -> Self {
        Self {
            format,
            cluster_view,
            table_meta,
            server_config,
            directory_view,
        }
    }
}

/// Group ids by a name, keeping only names shared by several ids
fn collisions<K, Id>(entries: impl Iterator<Item = (K, Id)>) -> Vec<(K, Vec<Id>)>
where
    K: Ord,
{
    let mut groups: BTreeMap<K, Vec<Id>> = BTreeMap::new();
    for (name, id) in entries {
        groups.entry(name).or_default().push(id);
    }
    groups.into_iter().filter(|(_, ids)| ids.len() > 1).collect()
}

fn id_list<T: ToString>(ids: &[T]) -> (Vec<String>, String) {
    let mut strings: Vec<String> = ids.iter().map(ToString::to_string).collect();
    strings.sort();
    let key = strings.join(",");
    (strings, key)
}

#[async_trait]
impl ArtificialTableBackend for IssuesBackend {
    async fn read_all_rows(&self, ctx: &OperationContext) -> AdminResult<Vec<Datum>> {
        ctx.check_interrupted()?;
        let cluster = self.cluster_view.get();
        let tables = self.table_meta.list_tables().await;
        let configs = self.server_config.all_configs();
        let directory = self.directory_view.get();
        let renderer = IdentityRenderer::new(self.format)
            .with_databases(&cluster)
            .with_tables(&tables)
            .with_servers(directory_server_names(&directory))
            .with_servers(self.server_config.server_names());

        let mut issues = Vec::new();

        let databases = cluster
            .databases
            .iter()
            .map(|(id, config)| (config.name.clone(), *id));
        for (name, ids) in collisions(databases) {
            let (ids, key) = id_list(&ids);
            issues.push(Issue {
                kind: "db_name_collision",
                critical: true,
                description: format!(
                    "There are {} databases named `{}`. Every database must have a unique \
                     name; rename all but one of them.",
                    ids.len(),
                    name
                ),
                info: json!({"name": name.as_str(), "ids": ids}),
                key,
            });
        }

        let table_names = tables
            .iter()
            .map(|(id, basic)| ((basic.database, basic.name.clone()), *id));
        for ((db, name), ids) in collisions(table_names) {
            let (ids, key) = id_list(&ids);
            issues.push(Issue {
                kind: "table_name_collision",
                critical: true,
                description: format!(
                    "There are {} tables named `{}.{}`. Every table in a database must have \
                     a unique name; rename all but one of them.",
                    ids.len(),
                    renderer.database(&db).as_str().unwrap_or_default(),
                    name
                ),
                info: json!({"name": name.as_str(), "db": renderer.database(&db), "ids": ids}),
                key,
            });
        }

        let server_names = configs
            .iter()
            .map(|(id, config)| (config.name.clone(), *id));
        for (name, ids) in collisions(server_names) {
            let (ids, key) = id_list(&ids);
            issues.push(Issue {
                kind: "server_name_collision",
                critical: true,
                description: format!(
                    "There are {} servers named `{}`. Every server must have a unique name; \
                     rename all but one of them.",
                    ids.len(),
                    name
                ),
                info: json!({"name": name.as_str(), "ids": ids}),
                key,
            });
        }

        let connected = by_server(&directory);
        let reporting: Vec<Datum> = connected.keys().map(|id| renderer.server(id)).collect();
        for (server, config) in &configs {
            if connected.contains_key(server) {
                continue;
            }
            issues.push(Issue {
                kind: "server_disconnected",
                critical: true,
                description: format!(
                    "Server `{}` is disconnected from the cluster.",
                    config.name
                ),
                info: json!({
                    "disconnected_server": renderer.server(server),
                    "reporting_servers": reporting,
                }),
                key: server.to_string(),
            });
        }

        Ok(issues.into_iter().map(Issue::into_row).collect())
    }

    async fn write_row(
        &self,
        _ctx: &OperationContext,
        _pkey: &Datum,
        _new_value: Option<Datum>,
    ) -> AdminResult<()> {
        Err(read_only(SystemTableKind::Issues.name()))
    }
}
