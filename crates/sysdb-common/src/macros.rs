/// Macro to generate a UUID-backed identifier newtype.
///
/// Eliminates boilerplate for the common pattern of wrapping `uuid::Uuid`
/// so that database, table, and server ids cannot be mixed up:
/// ```ignore
/// pub struct TableId(uuid::Uuid);
/// impl TableId { fn new() -> Self { ... } }
/// impl Display for TableId { ... }
/// impl FromStr for TableId { ... }
/// ```
///
/// # Usage
/// ```ignore
/// uuid_id!(
///     /// Identity of a table
///     TableId
/// );
/// ```
#[macro_export]
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Generate a fresh random identifier
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// The all-zero identifier
            pub const fn nil() -> Self {
                Self(uuid::Uuid::nil())
            }

            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|_| format!("Invalid {}: {}", stringify!($name), s))
            }
        }
    };
}
