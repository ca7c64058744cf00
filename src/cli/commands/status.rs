// status command handler
//
// Shows the operator's view of the engine: which tables forms own, the
// most recent migration attempts with their rollback identifiers, and
// physical form tables nothing claims.

use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

use crate::cli::command_context::CommandContext;
use crate::core::migration::MigrationRecord;

/// status command parameters
#[derive(Debug, Clone)]
pub struct StatusCommand {
    /// Project root path
    pub project_path: PathBuf,
    /// Explicit config file path
    pub config: Option<PathBuf>,
    /// Environment name
    pub env: String,
    /// How many recent migrations to show
    pub limit: i64,
}

/// status command handler
#[derive(Debug, Clone, Default)]
pub struct StatusCommandHandler {}

impl StatusCommandHandler {
    pub fn new() -> Self {
        Self {}
    }

    /// Execute the status command
    pub async fn execute(&self, command: &StatusCommand) -> Result<String> {
        let context =
            CommandContext::load_with(command.project_path.clone(), command.config.clone())?;
        let engine = context.engine(&command.env).await?;

        let tables = engine.claimed_tables().await?;
        let migrations = engine.recent_migrations(command.limit).await?;
        let orphans = engine.find_orphan_tables().await?;

        Ok(self.format_status(&tables, &migrations, &orphans))
    }

    fn format_status(
        &self,
        tables: &[String],
        migrations: &[MigrationRecord],
        orphans: &[String],
    ) -> String {
        let mut out = String::new();

        out.push_str(&format!("{}\n", "Materialized tables".bold()));
        if tables.is_empty() {
            out.push_str("  (none)\n");
        }
        for table in tables {
            out.push_str(&format!("  {}\n", table));
        }

        out.push_str(&format!("\n{}\n", "Recent migrations".bold()));
        if migrations.is_empty() {
            out.push_str("  (none)\n");
        }
        for record in migrations {
            let status = if record.success {
                "applied".green()
            } else {
                "failed".red()
            };
            out.push_str(&format!(
                "  {}  {:<14} {}.{}  {}\n",
                record.id,
                record.kind.as_str(),
                record.table_name,
                record.column_name,
                status
            ));
        }

        if !orphans.is_empty() {
            out.push_str(&format!(
                "\n{}\n",
                "Orphan tables (no form claims them)".yellow().bold()
            ));
            for orphan in orphans {
                out.push_str(&format!("  {}\n", orphan.yellow()));
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    use crate::core::migration::MigrationKind;

    #[test]
    fn test_format_status_lists_sections() {
        colored::control::set_override(false);

        let handler = StatusCommandHandler::new();
        let record = MigrationRecord {
            id: Uuid::nil(),
            table_name: "form_customer_intake".to_string(),
            column_name: "email".to_string(),
            kind: MigrationKind::DropColumn,
            before_config: None,
            after_config: None,
            success: true,
            error: None,
            rollback_sql: None,
            backup_id: None,
            actor: "operator".to_string(),
            applied_at: Utc::now(),
        };

        let output = handler.format_status(
            &["form_customer_intake".to_string()],
            &[record],
            &["form_abandoned".to_string()],
        );

        assert!(output.contains("Materialized tables"));
        assert!(output.contains("form_customer_intake"));
        assert!(output.contains("drop_column"));
        assert!(output.contains("applied"));
        assert!(output.contains("form_abandoned"));
    }

    #[test]
    fn test_format_status_empty() {
        colored::control::set_override(false);

        let handler = StatusCommandHandler::new();
        let output = handler.format_status(&[], &[], &[]);
        assert!(output.contains("(none)"));
        assert!(!output.contains("Orphan tables"));
    }
}
