// Shared command context
//
// Collects the config-file loading, validation and database connection
// steps every command repeats.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;

use crate::adapters::database::DatabaseHandle;
use crate::core::config::{DatabaseConfig, EngineConfig};
use crate::engine::SchemaEngine;

/// Execution context shared by the CLI commands
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub project_path: PathBuf,
    pub config_path: PathBuf,
    pub config: EngineConfig,
}

impl CommandContext {
    /// Load and validate the configuration from the project root
    pub fn load(project_path: PathBuf) -> Result<Self> {
        let config_path = project_path.join(EngineConfig::DEFAULT_CONFIG_PATH);
        Self::load_from(project_path, config_path)
    }

    /// Load from an explicit config path when one was given, otherwise
    /// from the project root
    pub fn load_with(project_path: PathBuf, config_path: Option<PathBuf>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from(project_path, path),
            None => Self::load(project_path),
        }
    }

    /// Load and validate the configuration from an explicit path
    pub fn load_from(project_path: PathBuf, config_path: PathBuf) -> Result<Self> {
        if !config_path.exists() {
            return Err(anyhow!(
                "Config file not found: {:?}. Please initialize the project first with the `init` command.",
                config_path
            ));
        }

        let raw = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
        let config = EngineConfig::from_str(&raw)?;
        config.validate()?;

        Ok(Self {
            project_path,
            config_path,
            config,
        })
    }

    /// Database settings for an environment
    pub fn database_config(&self, environment: &str) -> Result<DatabaseConfig> {
        self.config.get_database_config(environment)
    }

    /// Connect and assemble an engine for an environment
    pub async fn engine(&self, environment: &str) -> Result<SchemaEngine> {
        let db_config = self.database_config(environment)?;
        let db = DatabaseHandle::connect(self.config.dialect, &db_config)
            .await
            .with_context(|| format!("Failed to connect to environment '{}'", environment))?;

        let engine = SchemaEngine::new(db, &self.config);
        engine
            .init()
            .await
            .map_err(|e| anyhow!("Failed to initialize engine state tables: {}", e))?;
        Ok(engine)
    }
}
