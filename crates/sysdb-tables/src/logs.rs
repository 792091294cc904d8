//! `rethinkdb.logs`
//!
//! The most recent log lines of every connected server, fetched on each read.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use sysdb_common::{
    AdminErrorKind, AdminResult, Datum, IdentifierFormat, OperationContext, PeerId,
};
use sysdb_metadata::{
    ClusterDirectoryMetadata, MailboxManager, ServerConfigClient, WatchableMap,
};

use crate::backend::{ArtificialTableBackend, SystemTableKind, read_only};
use crate::datum::timestamp;
use crate::render::{IdentityRenderer, directory_server_names};

pub struct LogsBackend {
    format: IdentifierFormat,
    directory: Arc<WatchableMap<PeerId, ClusterDirectoryMetadata>>,
    server_config: Arc<dyn ServerConfigClient>,
    mailbox: Arc<dyn MailboxManager>,
    max_lines_per_server: usize,
}

impl LogsBackend {
    pub fn new(
        format: IdentifierFormat,
        directory: Arc<WatchableMap<PeerId, ClusterDirectoryMetadata>>,
        server_config: Arc<dyn ServerConfigClient>,
        mailbox: Arc<dyn MailboxManager>,
        max_lines_per_server: usize,
    ) -> Self {
        Self {
            format,
            directory,
            server_config,
            mailbox,
            max_lines_per_server,
        }
    }
}

#[async_trait]
impl ArtificialTableBackend for LogsBackend {
    async fn read_all_rows(&self, ctx: &OperationContext) -> AdminResult<Vec<Datum>> {
        ctx.check_interrupted()?;
        let directory = self.directory.snapshot();
        let renderer = IdentityRenderer::new(self.format)
            .with_servers(directory_server_names(&directory))
            .with_servers(self.server_config.server_names());

        let mut rows = Vec::new();
        for (peer, metadata) in &directory {
            let lines = match self
                .mailbox
                .fetch_logs(*peer, self.max_lines_per_server, &ctx.interruptor)
                .await
            {
                Ok(lines) => lines,
                Err(e) if e.is(AdminErrorKind::Interrupted) => return Err(e),
                Err(e) => {
                    // A server that disconnects mid-read just contributes no lines
                    tracing::warn!(%peer, error = %e, "failed to fetch logs");
                    continue;
                }
            };
            let server_uuid = metadata.server_id.to_string();
            for (index, line) in lines.iter().enumerate() {
                let time = timestamp(&line.timestamp);
                rows.push(json!({
                    "id": [time, server_uuid, index],
                    "server": renderer.server(&metadata.server_id),
                    "timestamp": time,
                    "uptime": line.uptime_secs,
                    "level": line.level.as_str(),
                    "message": line.message,
                }));
            }
        }
        Ok(rows)
    }

    async fn write_row(
        &self,
        _ctx: &OperationContext,
        _pkey: &Datum,
        _new_value: Option<Datum>,
    ) -> AdminResult<()> {
        Err(read_only(SystemTableKind::Logs.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sysdb_common::{NameString, ServerId};
    use sysdb_metadata::{
        InMemoryMailboxManager, InMemoryServerConfigClient, LogLevel, LogLine, ServerConfig,
    };

    fn line(message: &str) -> LogLine {
        LogLine {
            timestamp: Utc::now(),
            uptime_secs: 12.5,
            level: LogLevel::Notice,
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn test_lines_from_connected_servers() {
        let directory = Arc::new(WatchableMap::new());
        let servers = Arc::new(InMemoryServerConfigClient::new());
        let mailbox = Arc::new(InMemoryMailboxManager::new());

        let server = ServerId::new();
        let name = NameString::new("alpha").unwrap();
        servers.add_server(server, ServerConfig::new(name.clone()));
        let entry = ClusterDirectoryMetadata::new(server, PeerId::new(), name);
        let peer = entry.peer_id;
        directory.set_key(peer, entry);
        for i in 0..3 {
            mailbox.push_log(peer, line(&format!("event {}", i)));
        }
        // Disconnected peers are not asked
        mailbox.push_log(PeerId::new(), line("stale"));

        let backend = LogsBackend::new(
            IdentifierFormat::Name,
            directory.clone(),
            servers.clone(),
            mailbox.clone(),
            2,
        );
        let rows = backend
            .read_all_rows(&OperationContext::internal())
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["message"], json!("event 1"));
        assert_eq!(rows[0]["server"], json!("alpha"));
        assert_eq!(rows[0]["level"], json!("notice"));
        assert_eq!(rows[1]["id"][2], json!(1));

        let by_uuid = LogsBackend::new(IdentifierFormat::Uuid, directory, servers, mailbox, 2);
        let rows = by_uuid
            .read_all_rows(&OperationContext::internal())
            .await
            .unwrap();
        assert_eq!(rows[0]["server"], json!(server.to_string()));
    }
}
