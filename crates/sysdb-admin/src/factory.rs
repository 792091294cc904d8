//! Construction of every system table and the dispatcher that serves them

use std::sync::Arc;

use sysdb_common::{AdminResult, AuthMetadata, IdentifierFormat, PeerId};
use sysdb_metadata::{
    ClusterDirectoryMetadata, ClusterMetadata, DirectorySnapshot, HeartbeatMetadata,
    MailboxManager, NamespaceRepo, SemilatticeView, ServerConfigClient, TableMetaClient,
    Watchable, WatchableMap,
};
use sysdb_tables::{
    ClusterConfigBackend, DbConfigBackend, DebugScratchBackend, DebugStatsBackend,
    DebugTableStatusBackend, IssuesBackend, JobsBackend, LogsBackend, PermissionsBackend,
    ServerConfigBackend, ServerStatusBackend, StatsBackend, TableBackend, TableConfigBackend,
    TableStatusBackend, UsersBackend,
};

use crate::artificial::ArtificialClusterInterface;
use crate::cluster_interface::ClusterInterface;
use crate::config::AdminConfig;
use crate::registry::BackendRegistry;

/// Metadata views and cluster services the system tables are built from
#[derive(Clone)]
pub struct ClusterHandles {
    pub auth_view: Arc<SemilatticeView<AuthMetadata>>,
    pub cluster_view: Arc<SemilatticeView<ClusterMetadata>>,
    pub heartbeat_view: Arc<SemilatticeView<HeartbeatMetadata>>,
    pub directory_view: Arc<dyn Watchable<DirectorySnapshot>>,
    pub directory_map: Arc<WatchableMap<PeerId, ClusterDirectoryMetadata>>,
    pub table_meta: Arc<dyn TableMetaClient>,
    pub server_config: Arc<dyn ServerConfigClient>,
    pub namespace_repo: Arc<dyn NamespaceRepo>,
    pub mailbox: Arc<dyn MailboxManager>,
}

/// Owns the system table backends and the dispatcher in front of `next`
///
/// Keep this alive for as long as calls may reach the dispatcher.
pub struct AdminArtificialTables {
    registry: Arc<BackendRegistry>,
    interface: Arc<ArtificialClusterInterface>,
}

/// One backend instance per identifier format
fn pair<B>(
    build: impl Fn(IdentifierFormat) -> B,
    wrap: impl Fn(Arc<B>) -> TableBackend,
) -> (TableBackend, TableBackend) {
    (
        wrap(Arc::new(build(IdentifierFormat::Name))),
        wrap(Arc::new(build(IdentifierFormat::Uuid))),
    )
}

fn single(backend: TableBackend) -> (TableBackend, TableBackend) {
    (backend.clone(), backend)
}

impl AdminArtificialTables {
    pub fn build(
        next: Arc<dyn ClusterInterface>,
        handles: ClusterHandles,
        config: &AdminConfig,
    ) -> AdminResult<Self> {
        let h = &handles;
        let pairs = vec![
            pair(
                |format| {
                    PermissionsBackend::new(
                        format,
                        h.auth_view.clone(),
                        h.cluster_view.clone(),
                        h.table_meta.clone(),
                    )
                },
                TableBackend::Permissions,
            ),
            single(TableBackend::Users(Arc::new(UsersBackend::new(
                h.auth_view.clone(),
                config.password_hash_cost,
            )))),
            single(TableBackend::ClusterConfig(Arc::new(
                ClusterConfigBackend::new(h.heartbeat_view.clone()),
            ))),
            single(TableBackend::DbConfig(Arc::new(DbConfigBackend::new(
                h.cluster_view.clone(),
                h.table_meta.clone(),
            )))),
            pair(
                |format| {
                    IssuesBackend::new(
                        format,
                        h.cluster_view.clone(),
                        h.table_meta.clone(),
                        h.server_config.clone(),
                        h.directory_view.clone(),
                    )
                },
                TableBackend::Issues,
            ),
            pair(
                |format| {
                    LogsBackend::new(
                        format,
                        h.directory_map.clone(),
                        h.server_config.clone(),
                        h.mailbox.clone(),
                        config.logs.max_lines_per_server,
                    )
                },
                TableBackend::Logs,
            ),
            single(TableBackend::ServerConfig(Arc::new(
                ServerConfigBackend::new(h.server_config.clone()),
            ))),
            pair(
                |format| {
                    ServerStatusBackend::new(
                        format,
                        h.directory_view.clone(),
                        h.server_config.clone(),
                    )
                },
                TableBackend::ServerStatus,
            ),
            pair(
                |format| {
                    StatsBackend::new(
                        format,
                        h.directory_map.clone(),
                        h.cluster_view.clone(),
                        h.table_meta.clone(),
                        h.server_config.clone(),
                        h.mailbox.clone(),
                    )
                },
                TableBackend::Stats,
            ),
            pair(
                |format| {
                    TableConfigBackend::new(
                        format,
                        h.cluster_view.clone(),
                        h.table_meta.clone(),
                        h.server_config.clone(),
                    )
                },
                TableBackend::TableConfig,
            ),
            pair(
                |format| {
                    TableStatusBackend::new(
                        format,
                        h.cluster_view.clone(),
                        h.table_meta.clone(),
                        h.server_config.clone(),
                    )
                },
                TableBackend::TableStatus,
            ),
            pair(
                |format| {
                    JobsBackend::new(
                        format,
                        h.directory_map.clone(),
                        h.cluster_view.clone(),
                        h.table_meta.clone(),
                        h.server_config.clone(),
                        h.mailbox.clone(),
                    )
                },
                TableBackend::Jobs,
            ),
            single(TableBackend::DebugScratch(Arc::new(
                DebugScratchBackend::new(),
            ))),
            single(TableBackend::DebugStats(Arc::new(DebugStatsBackend::new(
                h.directory_map.clone(),
                h.mailbox.clone(),
            )))),
            single(TableBackend::DebugTableStatus(Arc::new(
                DebugTableStatusBackend::new(h.table_meta.clone(), h.namespace_repo.clone()),
            ))),
        ];

        let registry = Arc::new(BackendRegistry::new(pairs)?);
        let interface = Arc::new(ArtificialClusterInterface::new(
            registry.clone(),
            next,
            config.default_identifier_format,
        )?);
        tracing::info!(
            tables = registry.len(),
            default_format = %config.default_identifier_format,
            "system tables ready"
        );
        Ok(Self {
            registry,
            interface,
        })
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// The dispatcher, as the single entry point for administrative queries
    pub fn cluster_interface(&self) -> Arc<dyn ClusterInterface> {
        self.interface.clone()
    }
}
