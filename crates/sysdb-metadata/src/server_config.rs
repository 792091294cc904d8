//! Server configuration client

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use sysdb_common::{AdminError, AdminResult, Interruptor, NameString, ServerId};

use crate::view::SemilatticeView;

/// Persistent, user-editable settings of one server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: NameString,
    pub tags: BTreeSet<String>,
    /// `None` lets the server size its own cache
    pub cache_size_mb: Option<f64>,
}

impl ServerConfig {
    pub fn new(name: NameString) -> Self {
        Self {
            name,
            tags: ["default".to_string()].into_iter().collect(),
            cache_size_mb: None,
        }
    }
}

/// Reads and updates the configuration of servers
#[async_trait]
pub trait ServerConfigClient: Send + Sync {
    /// Name of every known server
    fn server_names(&self) -> BTreeMap<ServerId, NameString>;

    fn server_config(&self, server: ServerId) -> Option<ServerConfig>;

    fn all_configs(&self) -> BTreeMap<ServerId, ServerConfig>;

    /// Apply a new configuration to a connected server
    async fn set_config(
        &self,
        server: ServerId,
        config: ServerConfig,
        interruptor: &Interruptor,
    ) -> AdminResult<()>;
}

/// Server configurations held in process
#[derive(Clone)]
pub struct InMemoryServerConfigClient {
    configs: Arc<SemilatticeView<BTreeMap<ServerId, ServerConfig>>>,
}

impl InMemoryServerConfigClient {
    pub fn new() -> Self {
        Self {
            configs: SemilatticeView::shared(BTreeMap::new()),
        }
    }

    /// Register a server, as happens when it first joins the cluster
    pub fn add_server(&self, server: ServerId, config: ServerConfig) {
        self.configs.apply(|configs| {
            configs.insert(server, config);
        });
    }
}

impl Default for InMemoryServerConfigClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServerConfigClient for InMemoryServerConfigClient {
    fn server_names(&self) -> BTreeMap<ServerId, NameString> {
        self.configs.read(|configs| {
            configs
                .iter()
                .map(|(id, config)| (*id, config.name.clone()))
                .collect()
        })
    }

    fn server_config(&self, server: ServerId) -> Option<ServerConfig> {
        self.configs.read(|configs| configs.get(&server).cloned())
    }

    fn all_configs(&self) -> BTreeMap<ServerId, ServerConfig> {
        self.configs.read(|configs| configs.clone())
    }

    async fn set_config(
        &self,
        server: ServerId,
        config: ServerConfig,
        interruptor: &Interruptor,
    ) -> AdminResult<()> {
        interruptor.check()?;
        self.configs.try_apply(|configs| {
            let clash = configs
                .iter()
                .any(|(id, other)| *id != server && other.name == config.name);
            if clash {
                return Err(AdminError::invalid(format!(
                    "Server `{}` already exists.",
                    config.name
                )));
            }
            match configs.get_mut(&server) {
                Some(slot) => {
                    *slot = config;
                    Ok(())
                }
                None => Err(AdminError::not_found(format!(
                    "Server `{}` does not exist or is not connected.",
                    server
                ))),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysdb_common::AdminErrorKind;

    fn name(s: &str) -> NameString {
        NameString::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_rename_server() {
        let client = InMemoryServerConfigClient::new();
        let server = ServerId::new();
        client.add_server(server, ServerConfig::new(name("alpha")));

        let mut config = client.server_config(server).unwrap();
        config.name = name("omega");
        client
            .set_config(server, config, &Interruptor::new())
            .await
            .unwrap();
        assert_eq!(client.server_names()[&server].as_str(), "omega");
    }

    #[tokio::test]
    async fn test_name_clash_rejected() {
        let client = InMemoryServerConfigClient::new();
        let a = ServerId::new();
        let b = ServerId::new();
        client.add_server(a, ServerConfig::new(name("alpha")));
        client.add_server(b, ServerConfig::new(name("beta")));

        let err = client
            .set_config(b, ServerConfig::new(name("alpha")), &Interruptor::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdminErrorKind::InvalidArgument);
        assert_eq!(client.server_names()[&b].as_str(), "beta");
    }

    #[tokio::test]
    async fn test_unknown_server() {
        let client = InMemoryServerConfigClient::new();
        let err = client
            .set_config(
                ServerId::new(),
                ServerConfig::new(name("alpha")),
                &Interruptor::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdminErrorKind::NotFound);
    }
}
