//! Internal tables prefixed with `_debug_`
//!
//! They expose raw metadata for troubleshooting and have no config or status.

mod scratch;
mod stats;
mod table_status;

pub use scratch::DebugScratchBackend;
pub use stats::DebugStatsBackend;
pub use table_status::DebugTableStatusBackend;
