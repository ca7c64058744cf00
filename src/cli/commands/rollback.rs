// rollback command handler
//
// Rolls back one applied migration by its ledger identifier. The engine
// checks availability live; this handler only parses input and formats
// the outcome.

use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use uuid::Uuid;

use crate::cli::command_context::CommandContext;

/// rollback command parameters
#[derive(Debug, Clone)]
pub struct RollbackCommand {
    /// Project root path
    pub project_path: PathBuf,
    /// Explicit config file path
    pub config: Option<PathBuf>,
    /// Environment name
    pub env: String,
    /// Ledger identifier of the migration to undo
    pub migration_id: String,
}

/// rollback command handler
#[derive(Debug, Clone, Default)]
pub struct RollbackCommandHandler {}

impl RollbackCommandHandler {
    pub fn new() -> Self {
        Self {}
    }

    /// Execute the rollback command
    pub async fn execute(&self, command: &RollbackCommand) -> Result<String> {
        let migration_id = Uuid::parse_str(&command.migration_id)
            .with_context(|| format!("Invalid migration id: {}", command.migration_id))?;

        let context =
            CommandContext::load_with(command.project_path.clone(), command.config.clone())?;
        let engine = context.engine(&command.env).await?;

        let outcome = engine
            .rollback(migration_id)
            .await
            .map_err(|e| anyhow!("{}", e))?;

        Ok(format!(
            "{} migration {} rolled back ({} row values restored)",
            "✓".green(),
            migration_id,
            outcome.rows_restored
        ))
    }
}
