// Form metadata store
//
// Persists form, sub-form and field definitions in the engine's own state
// tables (fb_forms, fb_fields), and owns creation of all state tables.
// The state tables use only portable DDL so the same statements run on
// every supported dialect. Flags are stored as INTEGER 0/1 and timestamps
// as RFC 3339 text for the same reason.

use sqlx::{Any, Row, Transaction};
use uuid::Uuid;

use crate::adapters::database::DatabaseHandle;
use crate::core::error::ExecutionError;
use crate::core::field::Field;
use crate::core::form::{Form, SubForm};

/// Engine state table: form and sub-form definitions
pub const FORMS_TABLE: &str = "fb_forms";

/// Engine state table: field definitions
pub const FIELDS_TABLE: &str = "fb_fields";

/// Engine state table: submission ledger
pub const SUBMISSIONS_TABLE: &str = "fb_submissions";

/// Engine state table: migration ledger
pub const MIGRATIONS_TABLE: &str = "fb_migrations";

/// Engine state table: backup snapshots
pub const BACKUPS_TABLE: &str = "fb_backups";

const STATE_TABLE_DDL: [&str; 5] = [
    "CREATE TABLE IF NOT EXISTS fb_forms (
        id VARCHAR(36) NOT NULL,
        title TEXT NOT NULL,
        table_name VARCHAR(63),
        parent_form_id VARCHAR(36),
        created_at VARCHAR(40) NOT NULL,
        PRIMARY KEY (id)
    )",
    "CREATE TABLE IF NOT EXISTS fb_fields (
        id VARCHAR(36) NOT NULL,
        form_id VARCHAR(36) NOT NULL,
        title TEXT NOT NULL,
        field_type VARCHAR(32) NOT NULL,
        column_name VARCHAR(63),
        display_order INTEGER NOT NULL,
        required INTEGER NOT NULL,
        show_in_list INTEGER NOT NULL,
        materialized INTEGER NOT NULL,
        options TEXT NOT NULL,
        created_at VARCHAR(40) NOT NULL,
        PRIMARY KEY (id)
    )",
    "CREATE TABLE IF NOT EXISTS fb_submissions (
        id VARCHAR(36) NOT NULL,
        form_id VARCHAR(36) NOT NULL,
        parent_row_id VARCHAR(36),
        submitted_by VARCHAR(255) NOT NULL,
        submitted_at VARCHAR(40) NOT NULL,
        status VARCHAR(16) NOT NULL,
        PRIMARY KEY (id)
    )",
    "CREATE TABLE IF NOT EXISTS fb_migrations (
        id VARCHAR(36) NOT NULL,
        table_name VARCHAR(63) NOT NULL,
        column_name VARCHAR(63) NOT NULL,
        kind VARCHAR(32) NOT NULL,
        before_config TEXT,
        after_config TEXT,
        success INTEGER NOT NULL,
        error TEXT,
        rollback_sql TEXT,
        backup_id VARCHAR(36),
        actor VARCHAR(255) NOT NULL,
        applied_at VARCHAR(40) NOT NULL,
        PRIMARY KEY (id)
    )",
    "CREATE TABLE IF NOT EXISTS fb_backups (
        id VARCHAR(36) NOT NULL,
        table_name VARCHAR(63) NOT NULL,
        column_name VARCHAR(63) NOT NULL,
        column_type TEXT NOT NULL,
        entries TEXT NOT NULL,
        taken_at VARCHAR(40) NOT NULL,
        retain_until VARCHAR(40) NOT NULL,
        hold INTEGER NOT NULL,
        PRIMARY KEY (id)
    )",
];

/// Stateless store over the fb_forms / fb_fields state tables
#[derive(Debug, Clone, Default)]
pub struct FormStore;

impl FormStore {
    pub fn new() -> Self {
        Self
    }

    /// Create every engine state table that does not exist yet
    pub async fn init_state_tables(&self, db: &DatabaseHandle) -> Result<(), ExecutionError> {
        for ddl in STATE_TABLE_DDL {
            sqlx::query(ddl)
                .execute(db.pool())
                .await
                .map_err(|e| ExecutionError::Query {
                    message: format!("Failed to create state table: {}", e),
                    sql: Some(ddl.to_string()),
                })?;
        }
        Ok(())
    }

    /// Persist a form definition (no table name yet)
    pub async fn insert_form(&self, db: &DatabaseHandle, form: &Form) -> Result<(), ExecutionError> {
        let ph = placeholders(db, 3);
        let sql = format!(
            "INSERT INTO fb_forms (id, title, table_name, parent_form_id, created_at) \
             VALUES ({}, {}, NULL, NULL, {})",
            ph[0], ph[1], ph[2]
        );
        sqlx::query(&sql)
            .bind(form.id.to_string())
            .bind(form.title.as_str())
            .bind(form.created_at.to_rfc3339())
            .execute(db.pool())
            .await
            .map_err(|e| query_error("Failed to insert form", &sql, e))?;
        Ok(())
    }

    /// Persist a sub-form definition under its owning form
    pub async fn insert_sub_form(
        &self,
        db: &DatabaseHandle,
        sub_form: &SubForm,
    ) -> Result<(), ExecutionError> {
        let ph = placeholders(db, 4);
        let sql = format!(
            "INSERT INTO fb_forms (id, title, table_name, parent_form_id, created_at) \
             VALUES ({}, {}, NULL, {}, {})",
            ph[0], ph[1], ph[2], ph[3]
        );
        sqlx::query(&sql)
            .bind(sub_form.id.to_string())
            .bind(sub_form.title.as_str())
            .bind(sub_form.form_id.to_string())
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(db.pool())
            .await
            .map_err(|e| query_error("Failed to insert sub-form", &sql, e))?;
        Ok(())
    }

    /// Record the materialized table name inside an open transaction, so
    /// the name write commits or rolls back together with the CREATE TABLE
    pub async fn set_table_name_tx(
        &self,
        db: &DatabaseHandle,
        tx: &mut Transaction<'_, Any>,
        form_id: Uuid,
        table_name: &str,
    ) -> Result<(), ExecutionError> {
        let ph = placeholders(db, 2);
        let sql = format!(
            "UPDATE fb_forms SET table_name = {} WHERE id = {}",
            ph[0], ph[1]
        );
        sqlx::query(&sql)
            .bind(table_name)
            .bind(form_id.to_string())
            .execute(&mut **tx)
            .await
            .map_err(|e| query_error("Failed to record table name", &sql, e))?;
        Ok(())
    }

    /// Persist a field definition inside an open transaction
    pub async fn insert_field_tx(
        &self,
        db: &DatabaseHandle,
        tx: &mut Transaction<'_, Any>,
        form_id: Uuid,
        field: &Field,
        materialized: bool,
    ) -> Result<(), ExecutionError> {
        let ph = placeholders(db, 11);
        let sql = format!(
            "INSERT INTO fb_fields (id, form_id, title, field_type, column_name, display_order, \
             required, show_in_list, materialized, options, created_at) \
             VALUES ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {})",
            ph[0], ph[1], ph[2], ph[3], ph[4], ph[5], ph[6], ph[7], ph[8], ph[9], ph[10]
        );
        let options = serde_json::to_string(&field.options).map_err(|e| ExecutionError::Query {
            message: format!("Failed to encode field options: {}", e),
            sql: None,
        })?;

        sqlx::query(&sql)
            .bind(field.id.to_string())
            .bind(form_id.to_string())
            .bind(field.title.as_str())
            .bind(field.field_type.as_str())
            .bind(field.column_name.as_deref())
            .bind(field.display_order)
            .bind(field.required as i32)
            .bind(field.show_in_list as i32)
            .bind(materialized as i32)
            .bind(options)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&mut **tx)
            .await
            .map_err(|e| query_error("Failed to insert field", &sql, e))?;
        Ok(())
    }

    /// Persist a field definition outside any transaction
    pub async fn insert_field(
        &self,
        db: &DatabaseHandle,
        form_id: Uuid,
        field: &Field,
        materialized: bool,
    ) -> Result<(), ExecutionError> {
        let mut tx = begin(db).await?;
        self.insert_field_tx(db, &mut tx, form_id, field, materialized)
            .await?;
        commit(tx).await
    }

    /// Whether a live field currently claims this column on this table
    pub async fn column_claimed(
        &self,
        db: &DatabaseHandle,
        table_name: &str,
        column_name: &str,
    ) -> Result<bool, ExecutionError> {
        let ph = placeholders(db, 2);
        let sql = format!(
            "SELECT COUNT(*) FROM fb_fields ff \
             JOIN fb_forms f ON ff.form_id = f.id \
             WHERE f.table_name = {} AND ff.column_name = {} AND ff.materialized = 1",
            ph[0], ph[1]
        );
        let row = sqlx::query(&sql)
            .bind(table_name)
            .bind(column_name)
            .fetch_one(db.pool())
            .await
            .map_err(|e| query_error("Failed to check column claim", &sql, e))?;
        let count: i64 = row
            .try_get(0)
            .map_err(|e| query_error("Failed to decode column claim count", &sql, e))?;
        Ok(count > 0)
    }

    /// Release a field's claim on its column after a drop
    pub async fn release_column(
        &self,
        db: &DatabaseHandle,
        table_name: &str,
        column_name: &str,
    ) -> Result<(), ExecutionError> {
        self.set_column_materialized(db, table_name, column_name, false)
            .await
    }

    /// Re-establish a field's claim after a drop rollback
    pub async fn reclaim_column(
        &self,
        db: &DatabaseHandle,
        table_name: &str,
        column_name: &str,
    ) -> Result<(), ExecutionError> {
        self.set_column_materialized(db, table_name, column_name, true)
            .await
    }

    async fn set_column_materialized(
        &self,
        db: &DatabaseHandle,
        table_name: &str,
        column_name: &str,
        materialized: bool,
    ) -> Result<(), ExecutionError> {
        let ph = placeholders(db, 3);
        let sql = format!(
            "UPDATE fb_fields SET materialized = {} \
             WHERE column_name = {} AND form_id IN \
             (SELECT id FROM fb_forms WHERE table_name = {})",
            ph[0], ph[1], ph[2]
        );
        sqlx::query(&sql)
            .bind(materialized as i32)
            .bind(column_name)
            .bind(table_name)
            .execute(db.pool())
            .await
            .map_err(|e| query_error("Failed to update column claim", &sql, e))?;
        Ok(())
    }

    /// Point a field at its renamed column
    pub async fn rename_field_column(
        &self,
        db: &DatabaseHandle,
        table_name: &str,
        old_name: &str,
        new_name: &str,
    ) -> Result<(), ExecutionError> {
        let ph = placeholders(db, 3);
        let sql = format!(
            "UPDATE fb_fields SET column_name = {} \
             WHERE column_name = {} AND form_id IN \
             (SELECT id FROM fb_forms WHERE table_name = {})",
            ph[0], ph[1], ph[2]
        );
        sqlx::query(&sql)
            .bind(new_name)
            .bind(old_name)
            .bind(table_name)
            .execute(db.pool())
            .await
            .map_err(|e| query_error("Failed to rename field column", &sql, e))?;
        Ok(())
    }

    /// Whether any form already owns this table name
    pub async fn table_name_taken(
        &self,
        db: &DatabaseHandle,
        table_name: &str,
    ) -> Result<bool, ExecutionError> {
        let ph = placeholders(db, 1);
        let sql = format!(
            "SELECT COUNT(*) FROM fb_forms WHERE table_name = {}",
            ph[0]
        );
        let row = sqlx::query(&sql)
            .bind(table_name)
            .fetch_one(db.pool())
            .await
            .map_err(|e| query_error("Failed to check table name", &sql, e))?;
        let count: i64 = row
            .try_get(0)
            .map_err(|e| query_error("Failed to decode table name count", &sql, e))?;
        Ok(count > 0)
    }

    /// Every table name currently owned by a form or sub-form
    pub async fn list_claimed_tables(
        &self,
        db: &DatabaseHandle,
    ) -> Result<Vec<String>, ExecutionError> {
        let sql = "SELECT table_name FROM fb_forms WHERE table_name IS NOT NULL";
        let rows = sqlx::query(sql)
            .fetch_all(db.pool())
            .await
            .map_err(|e| query_error("Failed to list claimed tables", sql, e))?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row
                .try_get(0)
                .map_err(|e| query_error("Failed to decode table name", sql, e))?;
            tables.push(name);
        }
        Ok(tables)
    }
}

/// Positional placeholders for the handle's dialect, 1-based
pub fn placeholders(db: &DatabaseHandle, count: usize) -> Vec<String> {
    let generator = crate::adapters::sql_generator::generator_for(db.dialect());
    (1..=count).map(|i| generator.placeholder(i)).collect()
}

/// Begin a transaction on the handle's pool
pub async fn begin(db: &DatabaseHandle) -> Result<Transaction<'static, Any>, ExecutionError> {
    db.pool()
        .begin()
        .await
        .map_err(|e| ExecutionError::Transaction {
            message: format!("Failed to begin transaction: {}", e),
        })
}

/// Commit a transaction
pub async fn commit(tx: Transaction<'_, Any>) -> Result<(), ExecutionError> {
    tx.commit().await.map_err(|e| ExecutionError::Transaction {
        message: format!("Failed to commit transaction: {}", e),
    })
}

fn query_error(message: &str, sql: &str, e: sqlx::Error) -> ExecutionError {
    ExecutionError::Query {
        message: format!("{}: {}", message, e),
        sql: Some(sql.to_string()),
    }
}
