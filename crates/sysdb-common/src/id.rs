//! Stable identifiers for databases, tables, servers, and peers

use crate::uuid_id;

uuid_id!(
    /// Identity of a database; survives renames
    DatabaseId
);

uuid_id!(
    /// Identity of a table; survives renames and moves between databases
    TableId
);

uuid_id!(
    /// Identity of a server in the cluster
    ServerId
);

uuid_id!(
    /// Identity of a connected peer process
    PeerId
);
