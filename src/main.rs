use anyhow::Result;
use clap::Parser;
use std::env;
use std::process;
use tracing_subscriber::EnvFilter;

use formbase::cli::commands::gc_backups::{GcBackupsCommand, GcBackupsCommandHandler};
use formbase::cli::commands::init::{InitCommand, InitCommandHandler};
use formbase::cli::commands::reconcile::{ReconcileCommand, ReconcileCommandHandler};
use formbase::cli::commands::rollback::{RollbackCommand, RollbackCommandHandler};
use formbase::cli::commands::status::{StatusCommand, StatusCommandHandler};
use formbase::cli::{Cli, Commands};
use formbase::core::config::Dialect;

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new(if cli.verbose { "debug" } else { "warn" })
            }),
        )
        .with_target(false)
        .init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let runtime = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");
    let result = runtime.block_on(run_command(cli));

    match result {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

/// Route the parsed command to its handler
async fn run_command(cli: Cli) -> Result<String> {
    let project_path = env::current_dir()?;

    match cli.command {
        Commands::Init { dialect, force } => {
            let dialect = parse_dialect(&dialect)?;
            let handler = InitCommandHandler::new();
            let command = InitCommand {
                project_path,
                dialect,
                force,
            };
            handler.execute(&command)?;
            Ok("Project initialized.".to_string())
        }

        Commands::Status { env, limit } => {
            let handler = StatusCommandHandler::new();
            let command = StatusCommand {
                project_path,
                config: cli.config,
                env,
                limit,
            };
            handler.execute(&command).await
        }

        Commands::Rollback { migration_id, env } => {
            let handler = RollbackCommandHandler::new();
            let command = RollbackCommand {
                project_path,
                config: cli.config,
                env,
                migration_id,
            };
            handler.execute(&command).await
        }

        Commands::Reconcile { table, env } => {
            let handler = ReconcileCommandHandler::new();
            let command = ReconcileCommand {
                project_path,
                config: cli.config,
                env,
                table,
            };
            handler.execute(&command).await
        }

        Commands::GcBackups { env } => {
            let handler = GcBackupsCommandHandler::new();
            let command = GcBackupsCommand {
                project_path,
                config: cli.config,
                env,
            };
            handler.execute(&command).await
        }
    }
}

/// Convert a dialect name to the Dialect type
fn parse_dialect(dialect: &str) -> Result<Dialect> {
    match dialect {
        "postgresql" | "postgres" => Ok(Dialect::PostgreSQL),
        "mysql" => Ok(Dialect::MySQL),
        "sqlite" => Ok(Dialect::SQLite),
        other => Err(anyhow::anyhow!(
            "Unsupported database dialect: {}. Please specify one of: postgresql, mysql, sqlite.",
            other
        )),
    }
}
