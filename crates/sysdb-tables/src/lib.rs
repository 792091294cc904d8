//! Sysdb Tables - Backends of the artificial tables in the `rethinkdb` database
//!
//! Each backend turns cluster metadata into rows and validates writes before
//! applying them through the metadata clients. [`TableBackend`] is the closed
//! set of backends the dispatcher routes to.

pub mod backend;
pub mod cluster_config;
pub mod datum;
pub mod db_config;
pub mod debug;
pub mod issues;
pub mod jobs;
pub mod logs;
pub mod permissions;
pub mod render;
pub mod server_config;
pub mod server_status;
pub mod stats;
pub mod table_config;
pub mod table_status;
pub mod users;

pub use backend::{
    ArtificialTableBackend, Capabilities, SystemTableKind, TableBackend, WritePolicy, read_only,
};
pub use cluster_config::ClusterConfigBackend;
pub use db_config::DbConfigBackend;
pub use debug::{DebugScratchBackend, DebugStatsBackend, DebugTableStatusBackend};
pub use issues::IssuesBackend;
pub use jobs::JobsBackend;
pub use logs::LogsBackend;
pub use permissions::PermissionsBackend;
pub use render::IdentityRenderer;
pub use server_config::ServerConfigBackend;
pub use server_status::ServerStatusBackend;
pub use stats::StatsBackend;
pub use table_config::TableConfigBackend;
pub use table_status::TableStatusBackend;
pub use users::UsersBackend;
