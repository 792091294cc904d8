//! Identifier format: how identities are rendered in system-table rows

use serde::{Deserialize, Serialize};

/// Selects whether databases, tables, and servers are rendered by name or by UUID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierFormat {
    #[default]
    Name,
    Uuid,
}

impl IdentifierFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            IdentifierFormat::Name => "name",
            IdentifierFormat::Uuid => "uuid",
        }
    }

    /// Resolve an optional caller-supplied format, falling back to `Name`
    pub fn or_default(format: Option<IdentifierFormat>) -> Self {
        format.unwrap_or_default()
    }
}

impl std::fmt::Display for IdentifierFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for IdentifierFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(IdentifierFormat::Name),
            "uuid" => Ok(IdentifierFormat::Uuid),
            _ => Err(format!(
                "Identifier format `{}` unrecognized (options are \"name\" and \"uuid\").",
                s
            )),
        }
    }
}
