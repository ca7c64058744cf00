// Engine configuration
//
// Loads and validates the engine configuration file (YAML): database
// connection settings per environment plus the engine-level knobs
// (backup retention, identifier length limit, lock wait timeout).

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Database dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[serde(rename = "postgresql")]
    PostgreSQL,
    #[serde(rename = "mysql")]
    MySQL,
    #[serde(rename = "sqlite")]
    SQLite,
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::PostgreSQL => write!(f, "postgresql"),
            Dialect::MySQL => write!(f, "mysql"),
            Dialect::SQLite => write!(f, "sqlite"),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Config file version
    pub version: String,

    /// Database dialect
    pub dialect: Dialect,

    /// Days a backup snapshot is retained before it is eligible for cleanup
    #[serde(default = "default_backup_retention_days")]
    pub backup_retention_days: i64,

    /// Maximum length of a generated SQL identifier, in bytes
    #[serde(default = "default_max_identifier_length")]
    pub max_identifier_length: usize,

    /// Maximum time a caller waits for the per-table migration lock
    #[serde(default = "default_lock_wait_timeout_secs")]
    pub lock_wait_timeout_secs: u64,

    /// Per-environment database settings
    pub environments: HashMap<String, DatabaseConfig>,
}

fn default_backup_retention_days() -> i64 {
    90
}

fn default_max_identifier_length() -> usize {
    63
}

fn default_lock_wait_timeout_secs() -> u64 {
    10
}

impl EngineConfig {
    /// Default config file name
    pub const DEFAULT_CONFIG_PATH: &'static str = ".formbase.yaml";

    /// Get the database settings for an environment
    pub fn get_database_config(&self, environment: &str) -> Result<DatabaseConfig> {
        self.environments.get(environment).cloned().ok_or_else(|| {
            anyhow!(
                "Environment '{}' not found. Available environments: {:?}",
                environment,
                self.environments.keys().collect::<Vec<_>>()
            )
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.version.is_empty() {
            return Err(anyhow!("Config file version is not specified"));
        }

        if self.environments.is_empty() {
            return Err(anyhow!(
                "At least one environment configuration is required"
            ));
        }

        if self.backup_retention_days <= 0 {
            return Err(anyhow!("backup_retention_days must be positive"));
        }

        if self.max_identifier_length < 16 || self.max_identifier_length > 128 {
            return Err(anyhow!(
                "max_identifier_length must be between 16 and 128 (got {})",
                self.max_identifier_length
            ));
        }

        for (env_name, db_config) in &self.environments {
            db_config
                .validate()
                .with_context(|| format!("Invalid config for environment '{}'", env_name))?;
        }

        Ok(())
    }
}

impl FromStr for EngineConfig {
    type Err = anyhow::Error;

    fn from_str(yaml: &str) -> Result<Self, Self::Err> {
        serde_saphyr::from_str(yaml).with_context(|| "Failed to parse config file")
    }
}

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Host name (unused for SQLite)
    #[serde(default = "default_host")]
    pub host: String,

    /// Port number
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database name (file path for SQLite)
    pub database: String,

    /// User name
    pub user: Option<String>,

    /// Password
    pub password: Option<String>,

    /// Connection acquire timeout in seconds
    pub timeout: Option<u64>,

    /// Maximum pool connections
    pub max_connections: Option<u32>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

impl DatabaseConfig {
    /// Validate database configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.is_empty() {
            return Err(anyhow!("Database name is not specified"));
        }

        Ok(())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database: String::new(),
            user: None,
            password: None,
            timeout: None,
            max_connections: None,
        }
    }
}
