//! `rethinkdb.cluster_config`
//!
//! Holds a single `heartbeat` row; rows can be updated but never inserted or
//! deleted.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use sysdb_common::{AdminError, AdminResult, Datum, OperationContext};
use sysdb_metadata::{HeartbeatMetadata, SemilatticeView};

use crate::backend::{ArtificialTableBackend, SystemTableKind, WritePolicy};
use crate::datum::{as_object, check_keys, check_primary_key, require};

const HEARTBEAT_ID: &str = "heartbeat";

pub struct ClusterConfigBackend {
    heartbeat_view: Arc<SemilatticeView<HeartbeatMetadata>>,
}

impl ClusterConfigBackend {
    pub fn new(heartbeat_view: Arc<SemilatticeView<HeartbeatMetadata>>) -> Self {
        Self { heartbeat_view }
    }

    fn heartbeat_row(&self) -> Datum {
        let timeout_ms = self.heartbeat_view.read(|h| h.heartbeat_timeout_ms);
        json!({
            "id": HEARTBEAT_ID,
            "heartbeat_timeout_secs": timeout_ms as f64 / 1000.0,
        })
    }
}

#[async_trait]
impl ArtificialTableBackend for ClusterConfigBackend {
    async fn read_all_rows(&self, ctx: &OperationContext) -> AdminResult<Vec<Datum>> {
        ctx.check_interrupted()?;
        Ok(vec![self.heartbeat_row()])
    }

    async fn write_row(
        &self,
        ctx: &OperationContext,
        pkey: &Datum,
        new_value: Option<Datum>,
    ) -> AdminResult<()> {
        ctx.check_interrupted()?;
        let exists = pkey.as_str() == Some(HEARTBEAT_ID);
        WritePolicy::UpdateOnly.check(
            SystemTableKind::ClusterConfig.name(),
            exists,
            new_value.as_ref(),
        )?;
        let Some(row) = new_value else {
            return Ok(());
        };

        let obj = as_object(&row)?;
        check_keys(obj, &["id", "heartbeat_timeout_secs"])?;
        check_primary_key(obj, pkey)?;
        let secs = require(obj, "heartbeat_timeout_secs")?
            .as_f64()
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .ok_or_else(|| {
                AdminError::invalid("`heartbeat_timeout_secs` must be a positive number.")
            })?;
        let timeout_ms = (secs * 1000.0).round() as u64;
        if timeout_ms == 0 {
            return Err(AdminError::invalid(
                "`heartbeat_timeout_secs` must be at least one millisecond.",
            ));
        }

        self.heartbeat_view
            .apply(|h| h.heartbeat_timeout_ms = timeout_ms);
        tracing::info!(timeout_ms, "updated heartbeat timeout");
        Ok(())
    }
}
