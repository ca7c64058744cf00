// Backup snapshots
//
// Captures a column's full contents immediately before a destructive
// change, and replays captures during rollback. Snapshots live in the
// fb_backups state table with the captured rows JSON-encoded; values are
// rendered to text on capture and cast back to the recorded column type
// on restore.

use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::adapters::database::DatabaseHandle;
use crate::adapters::sql_generator::generator_for;
use crate::core::backup::{BackupSnapshot, RestoreReport, SnapshotEntry, SweepReport};
use crate::core::error::ExecutionError;
use crate::core::table_spec::ColumnType;
use crate::services::form_store::{begin, commit, placeholders};

/// Stores and replays column snapshots
#[derive(Debug, Clone)]
pub struct BackupStore {
    retention_days: i64,
}

impl BackupStore {
    /// Create a store whose snapshots expire after `retention_days`
    pub fn new(retention_days: i64) -> Self {
        Self { retention_days }
    }

    /// Capture a column's data and persist the snapshot durably
    ///
    /// Committed before any DDL runs, so a failed migration can never
    /// leave a destructive change without its snapshot.
    pub async fn snapshot_column(
        &self,
        db: &DatabaseHandle,
        table: &str,
        column: &str,
        column_type: &ColumnType,
    ) -> Result<BackupSnapshot, ExecutionError> {
        let generator = generator_for(db.dialect());
        let select = generator.snapshot_select(table, column);

        let rows = sqlx::query(&select)
            .fetch_all(db.pool())
            .await
            .map_err(|e| query_error("Failed to capture column snapshot", &select, e))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let row_id: String = row
                .try_get(0)
                .map_err(|e| query_error("Failed to decode snapshot row id", &select, e))?;
            let value: Option<String> = row
                .try_get(1)
                .map_err(|e| query_error("Failed to decode snapshot value", &select, e))?;
            entries.push(SnapshotEntry { row_id, value });
        }

        let snapshot = BackupSnapshot::new(
            table,
            column,
            column_type.clone(),
            entries,
            self.retention_days,
        );
        self.insert(db, &snapshot).await?;

        debug!(
            backup = %snapshot.id,
            table = %table,
            column = %column,
            rows = snapshot.row_count(),
            "captured column snapshot"
        );
        Ok(snapshot)
    }

    /// Load a snapshot by identifier
    pub async fn get(
        &self,
        db: &DatabaseHandle,
        id: Uuid,
    ) -> Result<Option<BackupSnapshot>, ExecutionError> {
        let ph = placeholders(db, 1);
        let sql = format!(
            "SELECT id, table_name, column_name, column_type, entries, taken_at, \
             retain_until, hold FROM fb_backups WHERE id = {}",
            ph[0]
        );
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(db.pool())
            .await
            .map_err(|e| query_error("Failed to load snapshot", &sql, e))?;

        row.map(|r| decode_snapshot(&r, &sql)).transpose()
    }

    /// Replay a snapshot into its source column
    ///
    /// Rows captured but since deleted are skipped, never recreated; the
    /// snapshot knows nothing about the rest of the row.
    pub async fn restore(
        &self,
        db: &DatabaseHandle,
        snapshot: &BackupSnapshot,
    ) -> Result<RestoreReport, ExecutionError> {
        let generator = generator_for(db.dialect());
        let update = generator.restore_update(
            &snapshot.table_name,
            &snapshot.column_name,
            &snapshot.column_type,
        );

        let mut report = RestoreReport {
            restored: 0,
            skipped: 0,
        };

        let mut tx = begin(db).await?;
        for entry in &snapshot.entries {
            let result = sqlx::query(&update)
                .bind(entry.value.as_deref())
                .bind(entry.row_id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| query_error("Failed to restore snapshot row", &update, e))?;

            if result.rows_affected() > 0 {
                report.restored += 1;
            } else {
                report.skipped += 1;
            }
        }
        commit(tx).await?;

        debug!(
            backup = %snapshot.id,
            restored = report.restored,
            skipped = report.skipped,
            "replayed column snapshot"
        );
        Ok(report)
    }

    /// Protect a snapshot from the retention sweep
    pub async fn mark_hold(&self, db: &DatabaseHandle, id: Uuid) -> Result<(), ExecutionError> {
        self.set_hold(db, id, true).await
    }

    /// Release a held snapshot back to normal retention
    pub async fn release_hold(&self, db: &DatabaseHandle, id: Uuid) -> Result<(), ExecutionError> {
        self.set_hold(db, id, false).await
    }

    /// Delete every expired, unheld snapshot
    ///
    /// Deletions are independent: one failure is logged and skipped so a
    /// single bad row cannot wedge the sweep.
    pub async fn sweep_expired(
        &self,
        db: &DatabaseHandle,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, ExecutionError> {
        let sql = "SELECT id, retain_until, hold FROM fb_backups";
        let rows = sqlx::query(sql)
            .fetch_all(db.pool())
            .await
            .map_err(|e| query_error("Failed to list snapshots", sql, e))?;

        let mut report = SweepReport::default();
        for row in rows {
            let id: String = row
                .try_get(0)
                .map_err(|e| query_error("Failed to decode snapshot id", sql, e))?;
            let retain_until: String = row
                .try_get(1)
                .map_err(|e| query_error("Failed to decode retention deadline", sql, e))?;
            let hold: i32 = row
                .try_get(2)
                .map_err(|e| query_error("Failed to decode hold flag", sql, e))?;

            let expired = match DateTime::parse_from_rfc3339(&retain_until) {
                Ok(deadline) => hold == 0 && now > deadline.with_timezone(&Utc),
                Err(e) => {
                    warn!(backup = %id, error = %e, "unparseable retention deadline, skipping");
                    report.failed += 1;
                    continue;
                }
            };
            if !expired {
                continue;
            }

            match self.delete(db, &id).await {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    warn!(backup = %id, error = %e, "failed to delete expired snapshot");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn insert(
        &self,
        db: &DatabaseHandle,
        snapshot: &BackupSnapshot,
    ) -> Result<(), ExecutionError> {
        let ph = placeholders(db, 8);
        let sql = format!(
            "INSERT INTO fb_backups (id, table_name, column_name, column_type, entries, \
             taken_at, retain_until, hold) VALUES ({}, {}, {}, {}, {}, {}, {}, {})",
            ph[0], ph[1], ph[2], ph[3], ph[4], ph[5], ph[6], ph[7]
        );
        let column_type = serde_json::to_string(&snapshot.column_type)
            .map_err(|e| encode_error("column type", e))?;
        let entries =
            serde_json::to_string(&snapshot.entries).map_err(|e| encode_error("entries", e))?;

        sqlx::query(&sql)
            .bind(snapshot.id.to_string())
            .bind(snapshot.table_name.as_str())
            .bind(snapshot.column_name.as_str())
            .bind(column_type)
            .bind(entries)
            .bind(snapshot.taken_at.to_rfc3339())
            .bind(snapshot.retain_until.to_rfc3339())
            .bind(snapshot.hold as i32)
            .execute(db.pool())
            .await
            .map_err(|e| query_error("Failed to persist snapshot", &sql, e))?;
        Ok(())
    }

    async fn set_hold(
        &self,
        db: &DatabaseHandle,
        id: Uuid,
        hold: bool,
    ) -> Result<(), ExecutionError> {
        let ph = placeholders(db, 2);
        let sql = format!("UPDATE fb_backups SET hold = {} WHERE id = {}", ph[0], ph[1]);
        sqlx::query(&sql)
            .bind(hold as i32)
            .bind(id.to_string())
            .execute(db.pool())
            .await
            .map_err(|e| query_error("Failed to update snapshot hold", &sql, e))?;
        Ok(())
    }

    async fn delete(&self, db: &DatabaseHandle, id: &str) -> Result<(), ExecutionError> {
        let ph = placeholders(db, 1);
        let sql = format!("DELETE FROM fb_backups WHERE id = {}", ph[0]);
        sqlx::query(&sql)
            .bind(id)
            .execute(db.pool())
            .await
            .map_err(|e| query_error("Failed to delete snapshot", &sql, e))?;
        Ok(())
    }
}

impl Default for BackupStore {
    fn default() -> Self {
        Self::new(90)
    }
}

fn decode_snapshot(row: &sqlx::any::AnyRow, sql: &str) -> Result<BackupSnapshot, ExecutionError> {
    let id: String = row
        .try_get(0)
        .map_err(|e| query_error("Failed to decode snapshot id", sql, e))?;
    let table_name: String = row
        .try_get(1)
        .map_err(|e| query_error("Failed to decode snapshot table", sql, e))?;
    let column_name: String = row
        .try_get(2)
        .map_err(|e| query_error("Failed to decode snapshot column", sql, e))?;
    let column_type: String = row
        .try_get(3)
        .map_err(|e| query_error("Failed to decode snapshot type", sql, e))?;
    let entries: String = row
        .try_get(4)
        .map_err(|e| query_error("Failed to decode snapshot entries", sql, e))?;
    let taken_at: String = row
        .try_get(5)
        .map_err(|e| query_error("Failed to decode capture time", sql, e))?;
    let retain_until: String = row
        .try_get(6)
        .map_err(|e| query_error("Failed to decode retention deadline", sql, e))?;
    let hold: i32 = row
        .try_get(7)
        .map_err(|e| query_error("Failed to decode hold flag", sql, e))?;

    Ok(BackupSnapshot {
        id: Uuid::parse_str(&id).map_err(|e| decode_error("snapshot id", &e.to_string()))?,
        table_name,
        column_name,
        column_type: serde_json::from_str(&column_type)
            .map_err(|e| decode_error("column type", &e.to_string()))?,
        entries: serde_json::from_str(&entries)
            .map_err(|e| decode_error("entries", &e.to_string()))?,
        taken_at: parse_timestamp(&taken_at)?,
        retain_until: parse_timestamp(&retain_until)?,
        hold: hold != 0,
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

fn encode_error(what: &str, e: serde_json::Error) -> ExecutionError {
    ExecutionError::Query {
        message: format!("Failed to encode snapshot {}: {}", what, e),
        sql: None,
    }
}

fn decode_error(what: &str, cause: &str) -> ExecutionError {
    ExecutionError::Query {
        message: format!("Failed to decode snapshot {}: {}", what, cause),
        sql: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_retention() {
        let store = BackupStore::default();
        assert_eq!(store.retention_days, 90);
    }

    #[test]
    fn test_column_type_survives_json_round_trip() {
        let original = ColumnType::DECIMAL {
            precision: 18,
            scale: 4,
        };
        let json = serde_json::to_string(&original).expect("encode");
        let decoded: ColumnType = serde_json::from_str(&json).expect("decode");
        assert_eq!(decoded, original);
    }
}
