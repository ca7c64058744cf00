// Row identity synchronization
//
// A submission and its materialized row share one identifier. The
// identifier is generated up front and threaded through both inserts,
// which run in a single transaction so the ledger and the table can never
// disagree about which rows exist. Reconciliation detects disagreement
// caused by out-of-band writes and reports it without repairing anything.

use std::collections::HashSet;

use chrono::Utc;
use sqlx::Row;
use tracing::{info, warn};
use uuid::Uuid;

use crate::adapters::database::DatabaseHandle;
use crate::adapters::sql_generator::generator_for;
use crate::adapters::sql_quote::{is_safe_identifier, quote_columns, quote_identifier};
use crate::core::error::{EngineResult, ExecutionError, IntegrityError};
use crate::core::form::{Submission, SubmissionStatus};
use crate::core::table_spec::{
    ColumnType, IDENTITY_COLUMN, PARENT_LINK_COLUMN, STATUS_COLUMN, SUBMITTED_AT_COLUMN,
    SUBMITTED_BY_COLUMN,
};
use crate::services::form_store::{begin, commit, placeholders};
use crate::services::table_locks::TableLockRegistry;
use std::sync::Arc;

/// One field value destined for a materialized column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnValue {
    /// Target column
    pub column: String,

    /// Column type, used to cast the bound text value
    pub column_type: ColumnType,

    /// Value rendered as text; None writes SQL NULL
    pub value: Option<String>,
}

/// Mismatches between the submission ledger and a materialized table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    /// Ledger entries with no matching row
    pub orphaned_ledger_entries: Vec<String>,

    /// Rows with no matching ledger entry
    pub orphaned_rows: Vec<String>,
}

impl ReconcileReport {
    /// Whether ledger and table agree completely
    pub fn is_clean(&self) -> bool {
        self.orphaned_ledger_entries.is_empty() && self.orphaned_rows.is_empty()
    }
}

/// Keeps submission identities and materialized rows in step
pub struct RowIdentitySynchronizer {
    locks: Arc<TableLockRegistry>,
}

impl RowIdentitySynchronizer {
    pub fn new(locks: Arc<TableLockRegistry>) -> Self {
        Self { locks }
    }

    /// Write a submission: one ledger entry and one materialized row,
    /// sharing a single freshly generated identifier, in one transaction
    pub async fn create_submission(
        &self,
        db: &DatabaseHandle,
        form_id: Uuid,
        table: &str,
        values: &[ColumnValue],
        submitted_by: &str,
        status: SubmissionStatus,
    ) -> EngineResult<Submission> {
        self.insert_submission(db, form_id, table, None, values, submitted_by, status)
            .await
    }

    /// Write a sub-form submission linked to an existing parent row
    pub async fn create_sub_submission(
        &self,
        db: &DatabaseHandle,
        sub_form_id: Uuid,
        table: &str,
        parent_table: &str,
        parent_row_id: &str,
        values: &[ColumnValue],
        submitted_by: &str,
        status: SubmissionStatus,
    ) -> EngineResult<Submission> {
        if !self.row_exists(db, parent_table, parent_row_id).await? {
            return Err(IntegrityError::ParentRowMissing {
                table: parent_table.to_string(),
                parent_id: parent_row_id.to_string(),
            }
            .into());
        }

        self.insert_submission(
            db,
            sub_form_id,
            table,
            Some(parent_row_id),
            values,
            submitted_by,
            status,
        )
        .await
    }

    /// Compare ledger identities against table identities, both ways
    ///
    /// Reports only. Orphans are never deleted here: either side may be
    /// the authoritative one and guessing risks data loss.
    pub async fn reconcile(
        &self,
        db: &DatabaseHandle,
        table: &str,
    ) -> EngineResult<ReconcileReport> {
        check_table_name(table)?;

        let ledger_ids = self.ledger_ids(db, table).await?;
        let row_ids = self.row_ids(db, table).await?;

        let ledger_set: HashSet<&String> = ledger_ids.iter().collect();
        let row_set: HashSet<&String> = row_ids.iter().collect();

        let mut report = ReconcileReport {
            orphaned_ledger_entries: ledger_ids
                .iter()
                .filter(|id| !row_set.contains(id))
                .cloned()
                .collect(),
            orphaned_rows: row_ids
                .iter()
                .filter(|id| !ledger_set.contains(id))
                .cloned()
                .collect(),
        };
        report.orphaned_ledger_entries.sort();
        report.orphaned_rows.sort();

        if report.is_clean() {
            info!(table = %table, "ledger and table identities agree");
        } else {
            warn!(
                table = %table,
                orphaned_entries = report.orphaned_ledger_entries.len(),
                orphaned_rows = report.orphaned_rows.len(),
                "identity mismatch detected"
            );
        }
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    async fn insert_submission(
        &self,
        db: &DatabaseHandle,
        form_id: Uuid,
        table: &str,
        parent_row_id: Option<&str>,
        values: &[ColumnValue],
        submitted_by: &str,
        status: SubmissionStatus,
    ) -> EngineResult<Submission> {
        check_table_name(table)?;
        for value in values {
            if !is_safe_identifier(&value.column) {
                return Err(ExecutionError::Query {
                    message: format!("Unsafe column name '{}' rejected", value.column),
                    sql: None,
                }
                .into());
            }
        }

        // One identity for both writes, generated before either runs.
        let id = Uuid::new_v4();
        let submitted_at = Utc::now();

        // Submissions wait for any migration in flight on this table.
        let _guard = self.locks.acquire(table).await?;

        let mut tx = begin(db).await?;

        let ph = placeholders(db, 6);
        let ledger_sql = format!(
            "INSERT INTO fb_submissions (id, form_id, parent_row_id, submitted_by, \
             submitted_at, status) VALUES ({}, {}, {}, {}, {}, {})",
            ph[0], ph[1], ph[2], ph[3], ph[4], ph[5]
        );
        sqlx::query(&ledger_sql)
            .bind(id.to_string())
            .bind(form_id.to_string())
            .bind(parent_row_id)
            .bind(submitted_by)
            .bind(submitted_at.to_rfc3339())
            .bind(status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| query_error("Failed to insert submission ledger entry", &ledger_sql, e))?;

        let row_sql = row_insert_sql(db.dialect(), table, parent_row_id.is_some(), values);
        let mut query = sqlx::query(&row_sql).bind(id.to_string());
        if let Some(parent) = parent_row_id {
            query = query.bind(parent);
        }
        for value in values {
            query = query.bind(value.value.as_deref());
        }
        query = query
            .bind(submitted_by)
            .bind(submitted_at.format("%Y-%m-%d %H:%M:%S").to_string())
            .bind(status.as_str());

        query
            .execute(&mut *tx)
            .await
            .map_err(|e| query_error("Failed to insert materialized row", &row_sql, e))?;

        commit(tx).await?;

        Ok(Submission {
            id,
            form_id,
            parent_row_id: parent_row_id.map(|p| p.to_string()),
            submitted_by: submitted_by.to_string(),
            submitted_at,
            status,
        })
    }

    async fn row_exists(
        &self,
        db: &DatabaseHandle,
        table: &str,
        row_id: &str,
    ) -> EngineResult<bool> {
        check_table_name(table)?;

        let generator = generator_for(db.dialect());
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = {}",
            quote_identifier(db.dialect(), IDENTITY_COLUMN),
            quote_identifier(db.dialect(), table),
            quote_identifier(db.dialect(), IDENTITY_COLUMN),
            generator.placeholder(1)
        );
        let row = sqlx::query(&sql)
            .bind(row_id)
            .fetch_optional(db.pool())
            .await
            .map_err(|e| query_error("Failed to look up parent row", &sql, e))?;
        Ok(row.is_some())
    }

    async fn ledger_ids(&self, db: &DatabaseHandle, table: &str) -> EngineResult<Vec<String>> {
        let ph = placeholders(db, 1);
        let sql = format!(
            "SELECT s.id FROM fb_submissions s \
             JOIN fb_forms f ON s.form_id = f.id \
             WHERE f.table_name = {}",
            ph[0]
        );
        let rows = sqlx::query(&sql)
            .bind(table)
            .fetch_all(db.pool())
            .await
            .map_err(|e| query_error("Failed to list submission identities", &sql, e))?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row
                .try_get(0)
                .map_err(|e| query_error("Failed to decode submission id", &sql, e))?;
            ids.push(id);
        }
        Ok(ids)
    }

    async fn row_ids(&self, db: &DatabaseHandle, table: &str) -> EngineResult<Vec<String>> {
        let sql = format!(
            "SELECT {} FROM {}",
            quote_identifier(db.dialect(), IDENTITY_COLUMN),
            quote_identifier(db.dialect(), table)
        );
        let rows = sqlx::query(&sql)
            .fetch_all(db.pool())
            .await
            .map_err(|e| query_error("Failed to list row identities", &sql, e))?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row
                .try_get(0)
                .map_err(|e| query_error("Failed to decode row id", &sql, e))?;
            ids.push(id);
        }
        Ok(ids)
    }
}

/// Build the materialized-row INSERT with per-type cast expressions
fn row_insert_sql(
    dialect: crate::core::config::Dialect,
    table: &str,
    with_parent: bool,
    values: &[ColumnValue],
) -> String {
    let generator = generator_for(dialect);

    let mut columns = vec![IDENTITY_COLUMN.to_string()];
    if with_parent {
        columns.push(PARENT_LINK_COLUMN.to_string());
    }
    for value in values {
        columns.push(value.column.clone());
    }
    columns.push(SUBMITTED_BY_COLUMN.to_string());
    columns.push(SUBMITTED_AT_COLUMN.to_string());
    columns.push(STATUS_COLUMN.to_string());

    let mut index = 1;
    let mut next = |expr: Option<&ColumnType>| {
        let rendered = match expr {
            Some(column_type) => generator.cast_expression(index, column_type),
            None => generator.placeholder(index),
        };
        index += 1;
        rendered
    };

    let mut exprs = vec![next(None)];
    if with_parent {
        exprs.push(next(None));
    }
    for value in values {
        exprs.push(next(Some(&value.column_type)));
    }
    exprs.push(next(None));
    exprs.push(next(Some(&ColumnType::TIMESTAMP)));
    exprs.push(next(None));

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(dialect, table),
        quote_columns(dialect, &columns),
        exprs.join(", ")
    )
}

fn check_table_name(table: &str) -> Result<(), ExecutionError> {
    if is_safe_identifier(table) {
        Ok(())
    } else {
        Err(ExecutionError::Query {
            message: format!("Unsafe table name '{}' rejected", table),
            sql: None,
        })
    }
}

fn query_error(message: &str, sql: &str, e: sqlx::Error) -> ExecutionError {
    ExecutionError::Query {
        message: format!("{}: {}", message, e),
        sql: Some(sql.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconcile_report_clean() {
        let report = ReconcileReport::default();
        assert!(report.is_clean());

        let dirty = ReconcileReport {
            orphaned_rows: vec!["r1".to_string()],
            ..Default::default()
        };
        assert!(!dirty.is_clean());
    }

    #[test]
    fn test_unsafe_table_name_rejected() {
        assert!(check_table_name("form_customer_intake").is_ok());
        assert!(check_table_name("form_x; DROP TABLE fb_forms").is_err());
    }

    #[test]
    fn test_row_insert_sql_casts_typed_values() {
        use crate::core::config::Dialect;

        let values = vec![
            ColumnValue {
                column: "full_name".to_string(),
                column_type: ColumnType::VARCHAR { length: 255 },
                value: Some("สมชาย".to_string()),
            },
            ColumnValue {
                column: "amount".to_string(),
                column_type: ColumnType::DECIMAL {
                    precision: 18,
                    scale: 4,
                },
                value: Some("120.50".to_string()),
            },
        ];

        let sql = row_insert_sql(Dialect::PostgreSQL, "form_orders", false, &values);
        assert_eq!(
            sql,
            "INSERT INTO \"form_orders\" (\"id\", \"full_name\", \"amount\", \"submitted_by\", \
             \"submitted_at\", \"status\") VALUES ($1, CAST($2 AS VARCHAR(255)), \
             CAST($3 AS NUMERIC(18, 4)), $4, CAST($5 AS TIMESTAMP), $6)"
        );
    }

    #[test]
    fn test_row_insert_sql_includes_parent_link() {
        use crate::core::config::Dialect;

        let sql = row_insert_sql(Dialect::SQLite, "form_line_items", true, &[]);
        assert!(sql.contains("\"parent_id\""));
        assert!(sql.starts_with("INSERT INTO \"form_line_items\" (\"id\", \"parent_id\""));
    }
}
