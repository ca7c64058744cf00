// Migration ledger
//
// Append-only audit record of every migration attempt, successful or not.
// Records are never updated or deleted; a rollback is itself appended as
// a new record rather than erasing the original.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::adapters::database::DatabaseHandle;
use crate::core::error::ExecutionError;
use crate::core::migration::{MigrationKind, MigrationRecord};
use crate::services::form_store::placeholders;

const RECORD_COLUMNS: &str = "id, table_name, column_name, kind, before_config, after_config, \
                              success, error, rollback_sql, backup_id, actor, applied_at";

/// Append-only migration history
#[async_trait]
pub trait MigrationLedger: Send + Sync {
    /// Append one attempt
    async fn record(
        &self,
        db: &DatabaseHandle,
        record: &MigrationRecord,
    ) -> Result<(), ExecutionError>;

    /// Load one attempt by identifier
    async fn get(
        &self,
        db: &DatabaseHandle,
        id: Uuid,
    ) -> Result<Option<MigrationRecord>, ExecutionError>;

    /// All attempts against one table, newest first
    async fn list_for_table(
        &self,
        db: &DatabaseHandle,
        table: &str,
    ) -> Result<Vec<MigrationRecord>, ExecutionError>;

    /// Most recent attempts across all tables, newest first
    async fn list_recent(
        &self,
        db: &DatabaseHandle,
        limit: i64,
    ) -> Result<Vec<MigrationRecord>, ExecutionError>;
}

/// Ledger backed by the fb_migrations state table
#[derive(Debug, Clone, Default)]
pub struct SqlMigrationLedger;

impl SqlMigrationLedger {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MigrationLedger for SqlMigrationLedger {
    async fn record(
        &self,
        db: &DatabaseHandle,
        record: &MigrationRecord,
    ) -> Result<(), ExecutionError> {
        let ph = placeholders(db, 12);
        let sql = format!(
            "INSERT INTO fb_migrations ({}) \
             VALUES ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {})",
            RECORD_COLUMNS,
            ph[0],
            ph[1],
            ph[2],
            ph[3],
            ph[4],
            ph[5],
            ph[6],
            ph[7],
            ph[8],
            ph[9],
            ph[10],
            ph[11]
        );
        sqlx::query(&sql)
            .bind(record.id.to_string())
            .bind(record.table_name.as_str())
            .bind(record.column_name.as_str())
            .bind(record.kind.as_str())
            .bind(record.before_config.as_deref())
            .bind(record.after_config.as_deref())
            .bind(record.success as i32)
            .bind(record.error.as_deref())
            .bind(record.rollback_sql.as_deref())
            .bind(record.backup_id.map(|id| id.to_string()))
            .bind(record.actor.as_str())
            .bind(record.applied_at.to_rfc3339())
            .execute(db.pool())
            .await
            .map_err(|e| query_error("Failed to append migration record", &sql, e))?;
        Ok(())
    }

    async fn get(
        &self,
        db: &DatabaseHandle,
        id: Uuid,
    ) -> Result<Option<MigrationRecord>, ExecutionError> {
        let ph = placeholders(db, 1);
        let sql = format!(
            "SELECT {} FROM fb_migrations WHERE id = {}",
            RECORD_COLUMNS, ph[0]
        );
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(db.pool())
            .await
            .map_err(|e| query_error("Failed to load migration record", &sql, e))?;
        row.map(|r| decode_record(&r, &sql)).transpose()
    }

    async fn list_for_table(
        &self,
        db: &DatabaseHandle,
        table: &str,
    ) -> Result<Vec<MigrationRecord>, ExecutionError> {
        let ph = placeholders(db, 1);
        let sql = format!(
            "SELECT {} FROM fb_migrations WHERE table_name = {} ORDER BY applied_at DESC",
            RECORD_COLUMNS, ph[0]
        );
        let rows = sqlx::query(&sql)
            .bind(table)
            .fetch_all(db.pool())
            .await
            .map_err(|e| query_error("Failed to list migration records", &sql, e))?;
        rows.iter().map(|r| decode_record(r, &sql)).collect()
    }

    async fn list_recent(
        &self,
        db: &DatabaseHandle,
        limit: i64,
    ) -> Result<Vec<MigrationRecord>, ExecutionError> {
        let ph = placeholders(db, 1);
        let sql = format!(
            "SELECT {} FROM fb_migrations ORDER BY applied_at DESC LIMIT {}",
            RECORD_COLUMNS, ph[0]
        );
        let rows = sqlx::query(&sql)
            .bind(limit)
            .fetch_all(db.pool())
            .await
            .map_err(|e| query_error("Failed to list migration records", &sql, e))?;
        rows.iter().map(|r| decode_record(r, &sql)).collect()
    }
}

fn decode_record(row: &sqlx::any::AnyRow, sql: &str) -> Result<MigrationRecord, ExecutionError> {
    let id: String = try_get(row, 0, sql)?;
    let table_name: String = try_get(row, 1, sql)?;
    let column_name: String = try_get(row, 2, sql)?;
    let kind: String = try_get(row, 3, sql)?;
    let before_config: Option<String> = try_get(row, 4, sql)?;
    let after_config: Option<String> = try_get(row, 5, sql)?;
    let success: i32 = try_get(row, 6, sql)?;
    let error: Option<String> = try_get(row, 7, sql)?;
    let rollback_sql: Option<String> = try_get(row, 8, sql)?;
    let backup_id: Option<String> = try_get(row, 9, sql)?;
    let actor: String = try_get(row, 10, sql)?;
    let applied_at: String = try_get(row, 11, sql)?;

    Ok(MigrationRecord {
        id: Uuid::parse_str(&id).map_err(|e| decode_error("record id", &e.to_string()))?,
        table_name,
        column_name,
        kind: MigrationKind::parse(&kind)
            .ok_or_else(|| decode_error("migration kind", &kind))?,
        before_config,
        after_config,
        success: success != 0,
        error,
        rollback_sql,
        backup_id: backup_id
            .map(|v| Uuid::parse_str(&v))
            .transpose()
            .map_err(|e| decode_error("backup id", &e.to_string()))?,
        actor,
        applied_at: parse_timestamp(&applied_at)?,
    })
}

fn try_get<'r, T>(row: &'r sqlx::any::AnyRow, index: usize, sql: &str) -> Result<T, ExecutionError>
where
    T: sqlx::Decode<'r, sqlx::Any> + sqlx::Type<sqlx::Any>,
{
    row.try_get(index).map_err(|e| ExecutionError::Query {
        message: format!("Failed to decode migration record: {}", e),
        sql: Some(sql.to_string()),
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ExecutionError> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| decode_error("timestamp", &e.to_string()))
}

fn query_error(message: &str, sql: &str, e: sqlx::Error) -> ExecutionError {
    ExecutionError::Query {
        message: format!("{}: {}", message, e),
        sql: Some(sql.to_string()),
    }
}

fn decode_error(what: &str, cause: &str) -> ExecutionError {
    ExecutionError::Query {
        message: format!("Failed to decode migration record {}: {}", what, cause),
        sql: None,
    }
}
