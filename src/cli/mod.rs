// CLI layer
// Accepts user input and routes it to the command handlers.

pub mod command_context;
pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Formbase - Form-to-Table Engine CLI
///
/// Operates the engine that materializes form designs as live SQL tables:
/// inspect migration history, roll back structural changes, reconcile
/// row identities and clean up expired backups.
#[derive(Parser, Debug)]
#[command(name = "formbase")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Form-to-table materialization engine CLI")]
#[command(long_about = "Formbase - Form-to-Table Engine CLI

Every form designed in the builder owns a real SQL table. This CLI is the
operator's view of that machinery: what tables exist, what structural
changes ran, what can still be rolled back and whether the submission
ledger agrees with the tables.

Supported databases: PostgreSQL, MySQL, SQLite")]
#[command(propagate_version = true)]
#[command(after_help = "GETTING STARTED:
  1. Initialize a project:          formbase init --dialect sqlite
  2. Check table and ledger state:  formbase status
  3. Roll back a migration:         formbase rollback <MIGRATION_ID>
  4. Verify row identities:         formbase reconcile
  5. Clean up expired backups:      formbase gc-backups

For detailed help on each command, use: formbase <command> --help")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new engine project
    ///
    /// Creates the configuration file with per-environment database
    /// settings for the chosen dialect.
    ///
    /// EXAMPLES:
    ///   # Initialize with SQLite
    ///   formbase init --dialect sqlite
    ///
    ///   # Force re-initialization
    ///   formbase init --dialect postgresql --force
    Init {
        /// Database dialect (postgresql, mysql, sqlite)
        #[arg(short, long, value_name = "DIALECT")]
        dialect: String,

        /// Force initialization even if config exists
        #[arg(short, long)]
        force: bool,
    },

    /// Show materialized tables and recent migrations
    ///
    /// Lists every table owned by a form, the most recent migration
    /// attempts, and any physical form tables nothing claims.
    ///
    /// EXAMPLES:
    ///   formbase status
    ///   formbase status --env production
    Status {
        /// Target environment
        #[arg(short, long, value_name = "ENV", default_value = "development")]
        env: String,

        /// How many recent migrations to show
        #[arg(long, value_name = "N", default_value = "20")]
        limit: i64,
    },

    /// Roll back an applied migration
    ///
    /// Availability is checked live: the linked backup must still be
    /// retained and a dropped column's name must not have been re-claimed.
    ///
    /// EXAMPLES:
    ///   formbase rollback 6f9619ff-8b86-4d01-b42d-00cf4fc964ff
    Rollback {
        /// Migration identifier from the ledger
        #[arg(value_name = "MIGRATION_ID")]
        migration_id: String,

        /// Target environment
        #[arg(short, long, value_name = "ENV", default_value = "development")]
        env: String,
    },

    /// Check submission ledger and table identities for agreement
    ///
    /// Reports orphaned ledger entries and orphaned rows. Nothing is
    /// repaired automatically.
    ///
    /// EXAMPLES:
    ///   # Reconcile every materialized table
    ///   formbase reconcile
    ///
    ///   # Reconcile one table
    ///   formbase reconcile --table form_customer_intake
    Reconcile {
        /// Restrict the check to one table
        #[arg(short, long, value_name = "TABLE")]
        table: Option<String>,

        /// Target environment
        #[arg(short, long, value_name = "ENV", default_value = "development")]
        env: String,
    },

    /// Delete expired backup snapshots
    ///
    /// Removes snapshots past their retention deadline unless they are
    /// held by a completed rollback.
    ///
    /// EXAMPLES:
    ///   formbase gc-backups --env production
    GcBackups {
        /// Target environment
        #[arg(short, long, value_name = "ENV", default_value = "development")]
        env: String,
    },
}
