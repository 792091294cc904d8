//! `rethinkdb.server_status`

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use sysdb_common::{AdminResult, Datum, IdentifierFormat, OperationContext};
use sysdb_metadata::{ClusterDirectoryMetadata, DirectorySnapshot, ServerConfigClient, Watchable};

use crate::backend::{ArtificialTableBackend, SystemTableKind, read_only};
use crate::datum::timestamp;
use crate::render::{IdentityRenderer, directory_server_names};

pub struct ServerStatusBackend {
    format: IdentifierFormat,
    directory_view: Arc<dyn Watchable<DirectorySnapshot>>,
    server_config: Arc<dyn ServerConfigClient>,
}

impl ServerStatusBackend {
    pub fn new(
        format: IdentifierFormat,
        directory_view: Arc<dyn Watchable<DirectorySnapshot>>,
        server_config: Arc<dyn ServerConfigClient>,
    ) -> Self {
        Self {
            format,
            directory_view,
            server_config,
        }
    }
}

fn row(
    metadata: &ClusterDirectoryMetadata,
    directory: &DirectorySnapshot,
    renderer: &IdentityRenderer,
) -> Datum {
    let mut connected_to = Map::new();
    for other in directory.values() {
        if other.server_id == metadata.server_id {
            continue;
        }
        connected_to.insert(
            renderer.server_label(&other.server_id),
            Value::Bool(metadata.connected_to.contains(&other.server_id)),
        );
    }
    json!({
        "id": metadata.server_id.to_string(),
        "name": metadata.server_name.as_str(),
        "network": {
            "hostname": metadata.hostname,
            "cluster_port": metadata.cluster_port,
            "reql_port": metadata.reql_port,
            "http_admin_port": metadata
                .http_admin_port
                .map(Value::from)
                .unwrap_or_else(|| Value::from("<no http admin>")),
            "time_connected": timestamp(&metadata.time_connected),
            "connected_to": connected_to,
        },
        "process": {
            "pid": metadata.pid,
            "version": metadata.version,
            "time_started": timestamp(&metadata.time_started),
            "cache_size_mb": metadata.cache_size_mb,
        },
    })
}

#[async_trait]
impl ArtificialTableBackend for ServerStatusBackend {
    async fn read_all_rows(&self, ctx: &OperationContext) -> AdminResult<Vec<Datum>> {
        ctx.check_interrupted()?;
        let directory = self.directory_view.get();
        let renderer = IdentityRenderer::new(self.format)
            .with_servers(directory_server_names(&directory))
            .with_servers(self.server_config.server_names());
        Ok(directory
            .values()
            .map(|metadata| row(metadata, &directory, &renderer))
            .collect())
    }

    async fn write_row(
        &self,
        _ctx: &OperationContext,
        _pkey: &Datum,
        _new_value: Option<Datum>,
    ) -> AdminResult<()> {
        Err(read_only(SystemTableKind::ServerStatus.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysdb_common::{NameString, PeerId, ServerId};
    use sysdb_metadata::{InMemoryServerConfigClient, WatchableMap};

    #[tokio::test]
    async fn test_connected_to_keyed_per_format() {
        let directory = Arc::new(WatchableMap::new());
        let servers = Arc::new(InMemoryServerConfigClient::new());
        let a = ClusterDirectoryMetadata::new(
            ServerId::new(),
            PeerId::new(),
            NameString::new("alpha").unwrap(),
        );
        let mut b = ClusterDirectoryMetadata::new(
            ServerId::new(),
            PeerId::new(),
            NameString::new("beta").unwrap(),
        );
        b.connected_to.insert(a.server_id);
        let (a_id, b_id) = (a.server_id, b.server_id);
        directory.set_key(a.peer_id, a);
        directory.set_key(b.peer_id, b);

        let ctx = OperationContext::internal();
        let by_name = ServerStatusBackend::new(
            IdentifierFormat::Name,
            directory.clone(),
            servers.clone(),
        );
        let row = by_name
            .read_row(&ctx, &json!(b_id.to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row["name"], json!("beta"));
        assert_eq!(row["network"]["connected_to"], json!({"alpha": true}));
        assert_eq!(row["network"]["reql_port"], json!(28015));

        let by_uuid = ServerStatusBackend::new(IdentifierFormat::Uuid, directory, servers);
        let row = by_uuid
            .read_row(&ctx, &json!(a_id.to_string()))
            .await
            .unwrap()
            .unwrap();
        let mut expected = Map::new();
        expected.insert(b_id.to_string(), Value::Bool(false));
        assert_eq!(row["network"]["connected_to"], Value::Object(expected));
    }
}
