// reconcile command handler
//
// Compares the submission ledger against the materialized tables and
// reports every identity mismatch. Mismatches are surfaced for the
// operator; nothing is repaired here.

use anyhow::{anyhow, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use crate::cli::command_context::CommandContext;
use crate::services::identity::ReconcileReport;

/// reconcile command parameters
#[derive(Debug, Clone)]
pub struct ReconcileCommand {
    /// Project root path
    pub project_path: PathBuf,
    /// Explicit config file path
    pub config: Option<PathBuf>,
    /// Environment name
    pub env: String,
    /// Restrict the check to one table
    pub table: Option<String>,
}

/// reconcile command handler
#[derive(Debug, Clone, Default)]
pub struct ReconcileCommandHandler {}

impl ReconcileCommandHandler {
    pub fn new() -> Self {
        Self {}
    }

    /// Execute the reconcile command
    pub async fn execute(&self, command: &ReconcileCommand) -> Result<String> {
        let context =
            CommandContext::load_with(command.project_path.clone(), command.config.clone())?;
        let engine = context.engine(&command.env).await?;

        let tables = match &command.table {
            Some(table) => vec![table.clone()],
            None => engine.claimed_tables().await?,
        };
        if tables.is_empty() {
            return Ok("No materialized tables to reconcile.".to_string());
        }

        let progress = ProgressBar::new(tables.len() as u64);
        progress.set_style(
            ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut reports: Vec<(String, ReconcileReport)> = Vec::with_capacity(tables.len());
        for table in tables {
            progress.set_message(table.clone());
            let report = engine
                .reconcile_identities(&table)
                .await
                .map_err(|e| anyhow!("{}", e))?;
            reports.push((table, report));
            progress.inc(1);
        }
        progress.finish_and_clear();

        Ok(self.format_reports(&reports))
    }

    fn format_reports(&self, reports: &[(String, ReconcileReport)]) -> String {
        let mut out = String::new();
        let mut dirty = 0;

        for (table, report) in reports {
            if report.is_clean() {
                out.push_str(&format!("{} {}\n", "✓".green(), table));
                continue;
            }

            dirty += 1;
            out.push_str(&format!("{} {}\n", "✗".red(), table));
            for id in &report.orphaned_ledger_entries {
                out.push_str(&format!(
                    "    ledger entry {} has no row\n",
                    id.yellow()
                ));
            }
            for id in &report.orphaned_rows {
                out.push_str(&format!(
                    "    row {} has no ledger entry\n",
                    id.yellow()
                ));
            }
        }

        if dirty == 0 {
            out.push_str("\nAll tables agree with the submission ledger.\n");
        } else {
            out.push_str(&format!(
                "\n{} table(s) need attention. Orphans are reported only, never deleted.\n",
                dirty
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_reports_clean_and_dirty() {
        colored::control::set_override(false);

        let handler = ReconcileCommandHandler::new();
        let reports = vec![
            ("form_clean".to_string(), ReconcileReport::default()),
            (
                "form_dirty".to_string(),
                ReconcileReport {
                    orphaned_ledger_entries: vec!["s1".to_string()],
                    orphaned_rows: vec!["r9".to_string()],
                },
            ),
        ];

        let output = handler.format_reports(&reports);
        assert!(output.contains("form_clean"));
        assert!(output.contains("ledger entry s1 has no row"));
        assert!(output.contains("row r9 has no ledger entry"));
        assert!(output.contains("1 table(s) need attention"));
    }
}
