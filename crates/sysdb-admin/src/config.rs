//! Settings of the administrative layer
//!
//! Loaded from an optional YAML file, overridden by `SYSDB_`-prefixed
//! environment variables. Nested keys use `__` in variable names, so
//! `logs.max_lines_per_server` is `SYSDB_LOGS__MAX_LINES_PER_SERVER`.

use std::path::Path;

use anyhow::Context;
use config::{Config, Environment, File};
use serde::Deserialize;

use sysdb_common::IdentifierFormat;

pub const DEFAULT_MAX_LOG_LINES_PER_SERVER: usize = 500;
pub const DEFAULT_PASSWORD_HASH_COST: u32 = 10;

const ENV_PREFIX: &str = "SYSDB";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogsTableConfig {
    /// Most recent lines fetched from each server for `rethinkdb.logs`
    pub max_lines_per_server: usize,
}

impl Default for LogsTableConfig {
    fn default() -> Self {
        Self {
            max_lines_per_server: DEFAULT_MAX_LOG_LINES_PER_SERVER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Format used when the caller does not pick one, and for grants
    pub default_identifier_format: IdentifierFormat,
    pub logs: LogsTableConfig,
    /// bcrypt cost for passwords set through `rethinkdb.users`
    pub password_hash_cost: u32,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            default_identifier_format: IdentifierFormat::Name,
            logs: LogsTableConfig::default(),
            password_hash_cost: DEFAULT_PASSWORD_HASH_COST,
        }
    }
}

impl AdminConfig {
    /// Load from `path` (if given) and the process environment
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        Self::load_from(path, Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn load_from(path: Option<&Path>, environment: Environment) -> anyhow::Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let config = builder
            .add_source(environment)
            .build()
            .context("Failed to build sysdb configuration")?;
        let config: AdminConfig = config
            .try_deserialize()
            .context("Invalid sysdb configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            (4..=31).contains(&self.password_hash_cost),
            "password_hash_cost must be between 4 and 31, got {}",
            self.password_hash_cost
        );
        anyhow::ensure!(
            self.logs.max_lines_per_server > 0,
            "logs.max_lines_per_server must be positive"
        );
        Ok(())
    }
}
