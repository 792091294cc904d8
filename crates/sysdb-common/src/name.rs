//! Validated names for databases, tables, servers, and users

use std::fmt::{Display, Formatter};
use std::sync::LazyLock;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{ADMIN_USERNAME, SYSTEM_DATABASE_NAME};

/// Regex pattern for validating names (databases, tables, servers, users)
static NAME_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new("^[A-Za-z0-9_-]+$").expect("Invalid regex pattern"));

/// Check whether a string is a legal name
///
/// Allowed characters: alphanumeric, underscore, hyphen. Empty names are illegal.
///
/// # Examples
///
/// ```
/// use sysdb_common::name::is_valid_name;
///
/// assert!(is_valid_name("table_status"));
/// assert!(is_valid_name("my-db"));
/// assert!(!is_valid_name("with spaces"));
/// assert!(!is_valid_name(""));
/// ```
pub fn is_valid_name(s: &str) -> bool {
    NAME_PATTERN.is_match(s)
}

/// A validated database, table, or server name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NameString(String);

impl NameString {
    pub fn new(s: impl Into<String>) -> Result<Self, String> {
        let s = s.into();
        if is_valid_name(&s) {
            Ok(Self(s))
        } else {
            Err(format!(
                "Name `{}` is invalid (Use A-Z, a-z, 0-9, _ and - only).",
                s
            ))
        }
    }

    /// The reserved name of the system database
    pub fn system_database() -> Self {
        Self(SYSTEM_DATABASE_NAME.to_string())
    }

    pub fn is_system_database(&self) -> bool {
        self.0 == SYSTEM_DATABASE_NAME
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NameString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for NameString {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for NameString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for NameString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for NameString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

/// A validated user name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    pub fn new(s: impl Into<String>) -> Result<Self, String> {
        let s = s.into();
        if is_valid_name(&s) {
            Ok(Self(s))
        } else {
            Err(format!(
                "Username `{}` is invalid (Use A-Z, a-z, 0-9, _ and - only).",
                s
            ))
        }
    }

    pub fn admin() -> Self {
        Self(ADMIN_USERNAME.to_string())
    }

    pub fn is_admin(&self) -> bool {
        self.0 == ADMIN_USERNAME
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Username {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

impl Display for Username {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_valid_names() {
        assert!(NameString::new("users").is_ok());
        assert!(NameString::new("_debug_scratch").is_ok());
        assert!(NameString::new("my-table_2").is_ok());
    }

    #[test]
    fn test_invalid_names() {
        assert!(NameString::new("").is_err());
        assert!(NameString::new("a b").is_err());
        assert!(NameString::new("a.b").is_err());
        let err = NameString::new("bad/name").unwrap_err();
        assert!(err.contains("bad/name"));
    }

    #[test]
    fn test_system_database_name() {
        assert!(NameString::system_database().is_system_database());
        assert!(!NameString::new("test").unwrap().is_system_database());
    }

    #[test]
    fn test_name_deserialize_rejects_invalid() {
        let ok: NameString = serde_json::from_str("\"orders\"").unwrap();
        assert_eq!(ok.as_str(), "orders");
        assert!(serde_json::from_str::<NameString>("\"no way\"").is_err());
    }

    #[test]
    fn test_username() {
        assert!(Username::admin().is_admin());
        let bob: Username = serde_json::from_str("\"bob\"").unwrap();
        assert!(!bob.is_admin());
        assert!(serde_json::from_str::<Username>("\"\"").is_err());
    }

    proptest! {
        #[test]
        fn prop_valid_charset_accepted(s in "[A-Za-z0-9_-]{1,32}") {
            prop_assert!(NameString::new(s.clone()).is_ok());
            prop_assert!(Username::new(s).is_ok());
        }

        #[test]
        fn prop_names_with_other_chars_rejected(
            prefix in "[a-z]{0,4}",
            bad in "[ ./@#$%]",
            suffix in "[a-z]{0,4}",
        ) {
            let s = format!("{}{}{}", prefix, bad, suffix);
            prop_assert!(NameString::new(s).is_err());
        }
    }
}
