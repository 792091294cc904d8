//! Sysdb Admin - Administrative query routing
//!
//! [`ArtificialClusterInterface`] answers administrative queries against the
//! `rethinkdb` system database from in-process table backends and forwards
//! everything else to the real cluster interface. [`AdminArtificialTables`]
//! builds the backends, the registry and the dispatcher together.

pub mod artificial;
pub mod cluster_interface;
pub mod config;
pub mod factory;
pub mod logging;
pub mod params;
pub mod registry;
pub mod table;

pub use artificial::ArtificialClusterInterface;
pub use cluster_interface::{BaseTable, ClusterInterface, Selection};
pub use config::{AdminConfig, LogsTableConfig};
pub use factory::{AdminArtificialTables, ClusterHandles};
pub use logging::{LoggingConfig, LoggingGuard, init_logging};
pub use params::{
    EmergencyRepairMode, ModifierConfig, SindexConfig, SindexStatus, TableGenerateConfigParams,
};
pub use registry::{BackendRegistry, TableBackendEntry};
pub use table::ArtificialTable;
