// init command handler
//
// Writes the default configuration file for the chosen dialect. Existing
// projects are detected and left alone unless --force is given.

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::config::{Dialect, EngineConfig};

/// init command parameters
#[derive(Debug, Clone)]
pub struct InitCommand {
    /// Project root path
    pub project_path: PathBuf,
    /// Database dialect
    pub dialect: Dialect,
    /// Overwrite an existing configuration
    pub force: bool,
}

/// init command handler
#[derive(Debug, Clone, Default)]
pub struct InitCommandHandler {}

impl InitCommandHandler {
    pub fn new() -> Self {
        Self {}
    }

    /// Execute the init command
    pub fn execute(&self, command: &InitCommand) -> Result<()> {
        if self.is_already_initialized(&command.project_path) && !command.force {
            return Err(anyhow!(
                "Project is already initialized. Use --force to overwrite the configuration."
            ));
        }

        let config_path = command
            .project_path
            .join(EngineConfig::DEFAULT_CONFIG_PATH);
        let content = default_config(command.dialect);
        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Whether a configuration file already exists
    pub fn is_already_initialized(&self, project_path: &Path) -> bool {
        project_path
            .join(EngineConfig::DEFAULT_CONFIG_PATH)
            .exists()
    }
}

/// Default configuration template for a dialect
fn default_config(dialect: Dialect) -> String {
    let development = match dialect {
        Dialect::SQLite => "    database: \"formbase.db\"\n".to_string(),
        Dialect::PostgreSQL => "    host: \"localhost\"\n    port: 5432\n    database: \"formbase\"\n    user: \"formbase\"\n    password: \"\"\n".to_string(),
        Dialect::MySQL => "    host: \"localhost\"\n    port: 3306\n    database: \"formbase\"\n    user: \"root\"\n    password: \"\"\n".to_string(),
    };

    format!(
        "version: \"1\"\n\
         dialect: {}\n\
         backup_retention_days: 90\n\
         max_identifier_length: 63\n\
         lock_wait_timeout_secs: 10\n\
         environments:\n\
         \x20 development:\n{}",
        dialect, development
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_default_config_parses_for_every_dialect() {
        for dialect in [Dialect::PostgreSQL, Dialect::MySQL, Dialect::SQLite] {
            let content = default_config(dialect);
            let config = EngineConfig::from_str(&content).expect("template should parse");
            assert_eq!(config.dialect, dialect);
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn test_init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().expect("tempdir");
        let handler = InitCommandHandler::new();
        let mut command = InitCommand {
            project_path: dir.path().to_path_buf(),
            dialect: Dialect::SQLite,
            force: false,
        };

        handler.execute(&command).expect("first init");
        assert!(handler.is_already_initialized(dir.path()));
        assert!(handler.execute(&command).is_err());

        command.force = true;
        handler.execute(&command).expect("forced init");
    }
}
