// gc-backups command handler
//
// Runs the backup retention sweep and reports what was deleted.

use anyhow::{anyhow, Result};
use colored::Colorize;
use std::path::PathBuf;

use crate::cli::command_context::CommandContext;

/// gc-backups command parameters
#[derive(Debug, Clone)]
pub struct GcBackupsCommand {
    /// Project root path
    pub project_path: PathBuf,
    /// Explicit config file path
    pub config: Option<PathBuf>,
    /// Environment name
    pub env: String,
}

/// gc-backups command handler
#[derive(Debug, Clone, Default)]
pub struct GcBackupsCommandHandler {}

impl GcBackupsCommandHandler {
    pub fn new() -> Self {
        Self {}
    }

    /// Execute the gc-backups command
    pub async fn execute(&self, command: &GcBackupsCommand) -> Result<String> {
        let context =
            CommandContext::load_with(command.project_path.clone(), command.config.clone())?;
        let engine = context.engine(&command.env).await?;

        let report = engine.sweep_backups().await.map_err(|e| anyhow!("{}", e))?;

        let mut out = format!(
            "{} {} expired snapshot(s) deleted",
            "✓".green(),
            report.deleted
        );
        if report.failed > 0 {
            out.push_str(&format!(
                "\n{} {} snapshot(s) could not be deleted, see logs",
                "⚠".yellow(),
                report.failed
            ));
        }
        Ok(out)
    }
}
