// Migration domain model
//
// A migration is one structural change to a materialized table. Steps are
// planned from a field-list diff, executed one at a time, and every attempt
// is recorded immutably in the ledger whether it succeeded or not.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::table_spec::ColumnSpec;

/// Kind of structural change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationKind {
    AddColumn,
    DropColumn,
    ModifyColumn,
    RenameColumn,
}

impl MigrationKind {
    /// Canonical name, matching the stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationKind::AddColumn => "add_column",
            MigrationKind::DropColumn => "drop_column",
            MigrationKind::ModifyColumn => "modify_column",
            MigrationKind::RenameColumn => "rename_column",
        }
    }

    /// Parse a stored kind value
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "add_column" => Some(MigrationKind::AddColumn),
            "drop_column" => Some(MigrationKind::DropColumn),
            "modify_column" => Some(MigrationKind::ModifyColumn),
            "rename_column" => Some(MigrationKind::RenameColumn),
            _ => None,
        }
    }
}

/// One planned structural change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationStep {
    /// Target table
    pub table: String,

    /// Kind of change
    pub kind: MigrationKind,

    /// Target column (the old name for renames)
    pub column: String,

    /// New column name, for renames only
    pub new_name: Option<String>,

    /// Column spec before the change (absent for adds)
    pub before: Option<ColumnSpec>,

    /// Column spec after the change (absent for drops)
    pub after: Option<ColumnSpec>,

    /// Whether a backup snapshot must be taken before executing
    pub destructive: bool,
}

impl MigrationStep {
    /// Plan an added column; non-destructive, rollback drops the column
    pub fn add_column(table: impl Into<String>, spec: ColumnSpec) -> Self {
        Self {
            table: table.into(),
            kind: MigrationKind::AddColumn,
            column: spec.name.clone(),
            new_name: None,
            before: None,
            after: Some(spec),
            destructive: false,
        }
    }

    /// Plan a dropped column; always destructive
    pub fn drop_column(table: impl Into<String>, spec: ColumnSpec) -> Self {
        Self {
            table: table.into(),
            kind: MigrationKind::DropColumn,
            column: spec.name.clone(),
            new_name: None,
            before: Some(spec),
            after: None,
            destructive: true,
        }
    }

    /// Plan a type change; destructive when the conversion can lose values
    pub fn modify_column(table: impl Into<String>, before: ColumnSpec, after: ColumnSpec) -> Self {
        let destructive = !before.column_type.is_lossless_change_to(&after.column_type);
        Self {
            table: table.into(),
            kind: MigrationKind::ModifyColumn,
            column: before.name.clone(),
            new_name: None,
            before: Some(before),
            after: Some(after),
            destructive,
        }
    }

    /// Plan a rename; treated as destructive for safety so concurrent
    /// readers of the old name always have a snapshot to fall back on
    pub fn rename_column(
        table: impl Into<String>,
        before: ColumnSpec,
        new_name: impl Into<String>,
    ) -> Self {
        let new_name = new_name.into();
        let mut after = before.clone();
        after.name = new_name.clone();
        Self {
            table: table.into(),
            kind: MigrationKind::RenameColumn,
            column: before.name.clone(),
            new_name: Some(new_name),
            before: Some(before),
            after: Some(after),
            destructive: true,
        }
    }

    /// Whether this step requires a backup before executing
    pub fn is_destructive(&self) -> bool {
        self.destructive
    }
}

/// One recorded migration attempt
///
/// Immutable once written. A failed migration is kept for audit, not
/// retried automatically. Rollback availability is never stored here;
/// it is computed live from snapshot existence and field-record state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Attempt identifier
    pub id: Uuid,

    /// Target table
    pub table_name: String,

    /// Target column
    pub column_name: String,

    /// Kind of change
    pub kind: MigrationKind,

    /// Column spec before the change, JSON-encoded
    pub before_config: Option<String>,

    /// Column spec after the change, JSON-encoded
    pub after_config: Option<String>,

    /// Whether the DDL succeeded
    pub success: bool,

    /// Failure reason, for failed attempts
    pub error: Option<String>,

    /// Generated rollback statement(s), newline-joined
    pub rollback_sql: Option<String>,

    /// Linked backup snapshot, for destructive changes
    pub backup_id: Option<Uuid>,

    /// Who requested the change
    pub actor: String,

    /// When the attempt finished
    pub applied_at: DateTime<Utc>,
}

impl MigrationRecord {
    /// Whether this attempt failed
    pub fn is_failed(&self) -> bool {
        !self.success
    }
}

/// Result of executing a migration step
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationOutcome {
    /// Whether the DDL succeeded
    pub success: bool,

    /// Ledger identifier of the attempt
    pub migration_id: Uuid,

    /// Whether a rollback is currently possible
    pub rollback_available: bool,
}

/// Result of rolling back a migration
#[derive(Debug, Clone, PartialEq)]
pub struct RollbackOutcome {
    /// Whether the rollback completed
    pub success: bool,

    /// Rows whose values were restored from the linked backup
    pub rows_restored: u64,
}
