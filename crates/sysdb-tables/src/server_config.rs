//! `rethinkdb.server_config`
//!
//! One row per server. Name, tags, and cache size are editable; servers join
//! and leave the cluster on their own, so rows cannot be inserted or deleted.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use sysdb_common::{AdminError, AdminResult, Datum, OperationContext, ServerId};
use sysdb_metadata::{ServerConfig, ServerConfigClient};

use crate::backend::{ArtificialTableBackend, SystemTableKind, WritePolicy};
use crate::datum::{as_object, check_keys, check_primary_key, expect_name, require};

const CACHE_SIZE_AUTO: &str = "auto";

pub struct ServerConfigBackend {
    client: Arc<dyn ServerConfigClient>,
}

fn row(server: &ServerId, config: &ServerConfig) -> Datum {
    json!({
        "id": server.to_string(),
        "name": config.name.as_str(),
        "tags": config.tags.iter().collect::<Vec<_>>(),
        "cache_size_mb": config
            .cache_size_mb
            .map(Value::from)
            .unwrap_or_else(|| Value::from(CACHE_SIZE_AUTO)),
    })
}

fn parse_tags(value: &Value) -> AdminResult<BTreeSet<String>> {
    let items = value
        .as_array()
        .ok_or_else(|| AdminError::invalid(format!("Expected an array for `tags`, got {}.", value)))?;
    let mut tags = BTreeSet::new();
    for item in items {
        let tag = expect_name(item, "tags")?;
        if !tags.insert(tag.as_str().to_string()) {
            return Err(AdminError::invalid(format!(
                "Tag `{}` appears more than once.",
                tag
            )));
        }
    }
    Ok(tags)
}

fn parse_cache_size(value: &Value) -> AdminResult<Option<f64>> {
    if let Some(s) = value.as_str() {
        return match s {
            CACHE_SIZE_AUTO => Ok(None),
            _ => Err(AdminError::invalid(format!(
                "Expected a number or \"{}\" for `cache_size_mb`, got \"{}\".",
                CACHE_SIZE_AUTO, s
            ))),
        };
    }
    value
        .as_f64()
        .filter(|mb| mb.is_finite() && *mb >= 0.0)
        .map(Some)
        .ok_or_else(|| {
            AdminError::invalid(format!(
                "Expected a non-negative number or \"{}\" for `cache_size_mb`, got {}.",
                CACHE_SIZE_AUTO, value
            ))
        })
}

impl ServerConfigBackend {
    pub fn new(client: Arc<dyn ServerConfigClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArtificialTableBackend for ServerConfigBackend {
    async fn read_all_rows(&self, ctx: &OperationContext) -> AdminResult<Vec<Datum>> {
        ctx.check_interrupted()?;
        Ok(self
            .client
            .all_configs()
            .iter()
            .map(|(server, config)| row(server, config))
            .collect())
    }

    async fn read_row(&self, ctx: &OperationContext, pkey: &Datum) -> AdminResult<Option<Datum>> {
        ctx.check_interrupted()?;
        let Some(server) = pkey.as_str().and_then(|s| s.parse::<ServerId>().ok()) else {
            return Ok(None);
        };
        Ok(self
            .client
            .server_config(server)
            .map(|config| row(&server, &config)))
    }

    async fn write_row(
        &self,
        ctx: &OperationContext,
        pkey: &Datum,
        new_value: Option<Datum>,
    ) -> AdminResult<()> {
        ctx.check_interrupted()?;
        let server = pkey.as_str().and_then(|s| s.parse::<ServerId>().ok());
        let current = server.and_then(|server| self.client.server_config(server));
        WritePolicy::UpdateOnly.check(
            SystemTableKind::ServerConfig.name(),
            current.is_some(),
            new_value.as_ref(),
        )?;
        let (Some(server), Some(current), Some(row)) = (server, current, new_value) else {
            return Ok(());
        };

        let obj = as_object(&row)?;
        check_keys(obj, &["id", "name", "tags", "cache_size_mb"])?;
        check_primary_key(obj, pkey)?;
        let config = ServerConfig {
            name: expect_name(require(obj, "name")?, "name")?,
            tags: parse_tags(require(obj, "tags")?)?,
            cache_size_mb: match obj.get("cache_size_mb") {
                Some(value) => parse_cache_size(value)?,
                None => current.cache_size_mb,
            },
        };
        if config == current {
            return Ok(());
        }

        self.client
            .set_config(server, config.clone(), &ctx.interruptor)
            .await?;
        tracing::info!(
            server = %server,
            name = %config.name,
            "updated server config"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysdb_common::{AdminErrorKind, NameString};
    use sysdb_metadata::InMemoryServerConfigClient;

    fn fixture() -> (Arc<InMemoryServerConfigClient>, ServerId, ServerConfigBackend) {
        let client = Arc::new(InMemoryServerConfigClient::new());
        let server = ServerId::new();
        client.add_server(server, ServerConfig::new(NameString::new("alpha").unwrap()));
        client.add_server(
            ServerId::new(),
            ServerConfig::new(NameString::new("beta").unwrap()),
        );
        (client.clone(), server, ServerConfigBackend::new(client))
    }

    #[tokio::test]
    async fn test_row_shape() {
        let (_, server, backend) = fixture();
        let row = backend
            .read_row(&OperationContext::internal(), &json!(server.to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            row,
            json!({
                "id": server.to_string(),
                "name": "alpha",
                "tags": ["default"],
                "cache_size_mb": "auto",
            })
        );
    }

    #[tokio::test]
    async fn test_update_name_tags_and_cache() {
        let (client, server, backend) = fixture();
        let id = json!(server.to_string());
        backend
            .write_row(
                &OperationContext::internal(),
                &id,
                Some(json!({
                    "id": id.clone(),
                    "name": "gamma",
                    "tags": ["ssd", "default"],
                    "cache_size_mb": 512,
                })),
            )
            .await
            .unwrap();
        let config = client.server_config(server).unwrap();
        assert_eq!(config.name.as_str(), "gamma");
        assert_eq!(config.tags.len(), 2);
        assert_eq!(config.cache_size_mb, Some(512.0));
    }

    #[tokio::test]
    async fn test_rejects_invalid_writes() {
        let (client, server, backend) = fixture();
        let ctx = OperationContext::internal();
        let id = json!(server.to_string());

        let clash = backend
            .write_row(
                &ctx,
                &id,
                Some(json!({"id": id.clone(), "name": "beta", "tags": []})),
            )
            .await
            .unwrap_err();
        assert_eq!(clash.kind, AdminErrorKind::InvalidArgument);

        let bad_cache = backend
            .write_row(
                &ctx,
                &id,
                Some(json!({"id": id.clone(), "name": "alpha", "tags": [], "cache_size_mb": "big"})),
            )
            .await
            .unwrap_err();
        assert_eq!(bad_cache.kind, AdminErrorKind::InvalidArgument);

        let delete = backend.write_row(&ctx, &id, None).await.unwrap_err();
        assert_eq!(delete.kind, AdminErrorKind::InvalidArgument);

        let insert = backend
            .write_row(
                &ctx,
                &json!(ServerId::new().to_string()),
                Some(json!({"name": "delta", "tags": []})),
            )
            .await
            .unwrap_err();
        assert_eq!(insert.kind, AdminErrorKind::InvalidArgument);

        assert_eq!(client.server_config(server).unwrap().name.as_str(), "alpha");
    }
}
