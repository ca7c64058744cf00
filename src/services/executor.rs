// Migration execution
//
// Runs planned structural steps against the live database under the
// per-table lock. Destructive steps get a durable snapshot before any DDL
// runs. Every attempt lands in the ledger, failed ones included, and
// rollback replays the inverse change from the recorded configuration
// plus the linked snapshot.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use crate::adapters::database::DatabaseHandle;
use crate::adapters::sql_generator::{generator_for, SqlGenerator};
use crate::core::error::{EngineError, EngineResult, ExecutionError};
use crate::core::migration::{
    MigrationKind, MigrationOutcome, MigrationRecord, MigrationStep, RollbackOutcome,
};
use crate::core::table_spec::ColumnSpec;
use crate::services::backup_store::BackupStore;
use crate::services::form_store::{begin, commit, FormStore};
use crate::services::ledger::{MigrationLedger, SqlMigrationLedger};
use crate::services::table_locks::TableLockRegistry;

/// Executes and rolls back migration steps
pub struct MigrationExecutor {
    backups: BackupStore,
    ledger: SqlMigrationLedger,
    store: FormStore,
    locks: Arc<TableLockRegistry>,
}

impl MigrationExecutor {
    pub fn new(backups: BackupStore, locks: Arc<TableLockRegistry>) -> Self {
        Self {
            backups,
            ledger: SqlMigrationLedger::new(),
            store: FormStore::new(),
            locks,
        }
    }

    /// Execute one planned step
    ///
    /// Takes the table lock, snapshots the affected column when the step
    /// is destructive, runs the DDL in a transaction and appends the
    /// attempt to the ledger whether it succeeded or failed. A ledger
    /// write that fails is an error in its own right: a change that
    /// cannot be recorded cannot be rolled back later.
    pub async fn execute(
        &self,
        db: &DatabaseHandle,
        step: &MigrationStep,
        actor: &str,
    ) -> EngineResult<MigrationOutcome> {
        let _guard = self.locks.acquire(&step.table).await?;

        let backup = if step.is_destructive() {
            let before = step.before.as_ref().ok_or_else(|| ExecutionError::Query {
                message: "Destructive step carries no before-configuration".to_string(),
                sql: None,
            })?;
            Some(
                self.backups
                    .snapshot_column(db, &step.table, &before.name, &before.column_type)
                    .await?,
            )
        } else {
            None
        };
        let backup_id = backup.as_ref().map(|b| b.id);

        let generator = generator_for(db.dialect());
        let statements = forward_statements(generator.as_ref(), step);
        let rollback_sql = inverse_statements(generator.as_ref(), step).join("\n");

        let migration_id = Uuid::new_v4();
        let ddl_result = run_ddl(db, &step.table, &statements).await;

        let record = MigrationRecord {
            id: migration_id,
            table_name: step.table.clone(),
            column_name: step.column.clone(),
            kind: step.kind,
            before_config: encode_spec(step.before.as_ref()),
            after_config: encode_spec(step.after.as_ref()),
            success: ddl_result.is_ok(),
            error: ddl_result.as_ref().err().map(|e| e.to_string()),
            rollback_sql: Some(rollback_sql),
            backup_id,
            actor: actor.to_string(),
            applied_at: Utc::now(),
        };
        let ledger_result = self.ledger.record(db, &record).await;

        if let Err(ddl_error) = ddl_result {
            error!(
                table = %step.table,
                column = %step.column,
                kind = step.kind.as_str(),
                error = %ddl_error,
                "migration failed, table left unchanged"
            );
            if let Err(ledger_error) = ledger_result {
                return Err(ExecutionError::Query {
                    message: format!(
                        "{}; recording the failed attempt also failed: {}",
                        ddl_error, ledger_error
                    ),
                    sql: None,
                }
                .into());
            }
            return Err(ddl_error.into());
        }
        if let Err(ledger_error) = ledger_result {
            error!(
                migration = %migration_id,
                table = %step.table,
                error = %ledger_error,
                "DDL applied but the ledger write failed"
            );
            return Err(ledger_error.into());
        }

        self.apply_metadata(db, step).await?;

        info!(
            migration = %migration_id,
            table = %step.table,
            column = %step.column,
            kind = step.kind.as_str(),
            "migration applied"
        );
        Ok(MigrationOutcome {
            success: true,
            migration_id,
            rollback_available: match step.kind {
                MigrationKind::DropColumn => backup_id.is_some(),
                _ => true,
            },
        })
    }

    /// Execute a whole plan in order, stopping at the first failure
    pub async fn execute_plan(
        &self,
        db: &DatabaseHandle,
        steps: &[MigrationStep],
        actor: &str,
    ) -> EngineResult<Vec<MigrationOutcome>> {
        let mut outcomes = Vec::with_capacity(steps.len());
        for step in steps {
            outcomes.push(self.execute(db, step, actor).await?);
        }
        Ok(outcomes)
    }

    /// Roll back a previously applied migration
    ///
    /// Availability is checked live: the record must exist and have
    /// succeeded, a destructive rollback needs its snapshot to still be
    /// retained, and a dropped column can only come back while no new
    /// field has claimed its name.
    pub async fn rollback(
        &self,
        db: &DatabaseHandle,
        migration_id: Uuid,
    ) -> EngineResult<RollbackOutcome> {
        let record = self
            .ledger
            .get(db, migration_id)
            .await?
            .ok_or_else(|| not_available(migration_id, "no such migration"))?;
        if record.is_failed() {
            return Err(not_available(
                migration_id,
                "a failed migration left the table unchanged",
            ));
        }

        let _guard = self.locks.acquire(&record.table_name).await?;

        let generator = generator_for(db.dialect());
        let rows_restored = match record.kind {
            MigrationKind::AddColumn => self.rollback_add(db, generator.as_ref(), &record).await?,
            MigrationKind::DropColumn => {
                self.rollback_drop(db, generator.as_ref(), &record).await?
            }
            MigrationKind::ModifyColumn => {
                self.rollback_modify(db, generator.as_ref(), &record).await?
            }
            MigrationKind::RenameColumn => {
                self.rollback_rename(db, generator.as_ref(), &record).await?
            }
        };

        let rollback_record = MigrationRecord {
            id: Uuid::new_v4(),
            table_name: record.table_name.clone(),
            column_name: record.column_name.clone(),
            kind: inverse_kind(record.kind),
            before_config: record.after_config.clone(),
            after_config: record.before_config.clone(),
            success: true,
            error: None,
            rollback_sql: None,
            backup_id: record.backup_id,
            actor: format!("rollback:{}", record.id),
            applied_at: Utc::now(),
        };
        if let Err(ledger_error) = self.ledger.record(db, &rollback_record).await {
            error!(
                migration = %migration_id,
                table = %record.table_name,
                error = %ledger_error,
                "rollback applied but the ledger write failed"
            );
            return Err(ledger_error.into());
        }

        info!(
            migration = %migration_id,
            table = %record.table_name,
            rows_restored,
            "migration rolled back"
        );
        Ok(RollbackOutcome {
            success: true,
            rows_restored,
        })
    }

    /// Undoing an add drops the column it created
    async fn rollback_add(
        &self,
        db: &DatabaseHandle,
        generator: &dyn SqlGenerator,
        record: &MigrationRecord,
    ) -> EngineResult<u64> {
        let ddl = vec![generator.drop_column(&record.table_name, &record.column_name)];
        run_ddl(db, &record.table_name, &ddl).await?;
        self.store
            .release_column(db, &record.table_name, &record.column_name)
            .await?;
        Ok(0)
    }

    /// Undoing a drop recreates the column and replays the snapshot
    async fn rollback_drop(
        &self,
        db: &DatabaseHandle,
        generator: &dyn SqlGenerator,
        record: &MigrationRecord,
    ) -> EngineResult<u64> {
        let snapshot = self.required_snapshot(db, record).await?;
        if self
            .store
            .column_claimed(db, &record.table_name, &record.column_name)
            .await?
        {
            return Err(not_available(
                record.id,
                "the column name has been re-claimed by another field",
            ));
        }

        let before = decode_spec(record.before_config.as_deref(), record.id)?;
        let ddl = vec![generator.add_column(&record.table_name, &before)];
        run_ddl(db, &record.table_name, &ddl).await?;

        let report = self.backups.restore(db, &snapshot).await?;
        self.backups.mark_hold(db, snapshot.id).await?;
        self.store
            .reclaim_column(db, &record.table_name, &record.column_name)
            .await?;
        Ok(report.restored)
    }

    /// Undoing a type change reverts the type and, when the forward
    /// change was lossy, replays the snapshot taken before it ran.
    /// A lossless change took no snapshot and needs no data restore.
    async fn rollback_modify(
        &self,
        db: &DatabaseHandle,
        generator: &dyn SqlGenerator,
        record: &MigrationRecord,
    ) -> EngineResult<u64> {
        let snapshot = match record.backup_id {
            Some(backup_id) => Some(
                self.backups
                    .get(db, backup_id)
                    .await?
                    .ok_or_else(|| not_available(record.id, "the backup snapshot has expired"))?,
            ),
            None => None,
        };
        let before = decode_spec(record.before_config.as_deref(), record.id)?;
        let after = decode_spec(record.after_config.as_deref(), record.id)?;

        let ddl = generator.change_column_type(&record.table_name, &after, &before);
        run_ddl(db, &record.table_name, &ddl).await?;

        match snapshot {
            Some(snapshot) => {
                let report = self.backups.restore(db, &snapshot).await?;
                self.backups.mark_hold(db, snapshot.id).await?;
                Ok(report.restored)
            }
            None => Ok(0),
        }
    }

    /// Undoing a rename moves the column back to its old name
    async fn rollback_rename(
        &self,
        db: &DatabaseHandle,
        generator: &dyn SqlGenerator,
        record: &MigrationRecord,
    ) -> EngineResult<u64> {
        let after = decode_spec(record.after_config.as_deref(), record.id)?;

        let ddl = vec![generator.rename_column(&record.table_name, &after.name, &record.column_name)];
        run_ddl(db, &record.table_name, &ddl).await?;
        self.store
            .rename_field_column(db, &record.table_name, &after.name, &record.column_name)
            .await?;
        Ok(0)
    }

    async fn required_snapshot(
        &self,
        db: &DatabaseHandle,
        record: &MigrationRecord,
    ) -> EngineResult<crate::core::backup::BackupSnapshot> {
        let backup_id = record
            .backup_id
            .ok_or_else(|| not_available(record.id, "no backup snapshot was taken"))?;
        self.backups
            .get(db, backup_id)
            .await?
            .ok_or_else(|| not_available(record.id, "the backup snapshot has expired"))
    }

    /// Keep field metadata in step with the applied DDL
    async fn apply_metadata(&self, db: &DatabaseHandle, step: &MigrationStep) -> EngineResult<()> {
        match step.kind {
            MigrationKind::DropColumn => {
                self.store
                    .release_column(db, &step.table, &step.column)
                    .await?;
            }
            MigrationKind::RenameColumn => {
                if let Some(new_name) = &step.new_name {
                    self.store
                        .rename_field_column(db, &step.table, &step.column, new_name)
                        .await?;
                }
            }
            MigrationKind::AddColumn | MigrationKind::ModifyColumn => {}
        }
        Ok(())
    }
}

/// Kind recorded for the ledger entry a rollback appends
fn inverse_kind(kind: MigrationKind) -> MigrationKind {
    match kind {
        MigrationKind::AddColumn => MigrationKind::DropColumn,
        MigrationKind::DropColumn => MigrationKind::AddColumn,
        MigrationKind::ModifyColumn => MigrationKind::ModifyColumn,
        MigrationKind::RenameColumn => MigrationKind::RenameColumn,
    }
}

/// DDL statements that apply a step
fn forward_statements(generator: &dyn SqlGenerator, step: &MigrationStep) -> Vec<String> {
    match step.kind {
        MigrationKind::AddColumn => match &step.after {
            Some(after) => vec![generator.add_column(&step.table, after)],
            None => Vec::new(),
        },
        MigrationKind::DropColumn => vec![generator.drop_column(&step.table, &step.column)],
        MigrationKind::ModifyColumn => match (&step.before, &step.after) {
            (Some(before), Some(after)) => {
                generator.change_column_type(&step.table, before, after)
            }
            _ => Vec::new(),
        },
        MigrationKind::RenameColumn => match &step.new_name {
            Some(new_name) => vec![generator.rename_column(&step.table, &step.column, new_name)],
            None => Vec::new(),
        },
    }
}

/// DDL statements that undo a step, recorded for audit
fn inverse_statements(generator: &dyn SqlGenerator, step: &MigrationStep) -> Vec<String> {
    match step.kind {
        MigrationKind::AddColumn => vec![generator.drop_column(&step.table, &step.column)],
        MigrationKind::DropColumn => match &step.before {
            Some(before) => vec![generator.add_column(&step.table, before)],
            None => Vec::new(),
        },
        MigrationKind::ModifyColumn => match (&step.before, &step.after) {
            (Some(before), Some(after)) => {
                generator.change_column_type(&step.table, after, before)
            }
            _ => Vec::new(),
        },
        MigrationKind::RenameColumn => match &step.new_name {
            Some(new_name) => vec![generator.rename_column(&step.table, new_name, &step.column)],
            None => Vec::new(),
        },
    }
}

/// Run DDL statements inside one transaction
///
/// MySQL commits DDL implicitly statement by statement; the transaction
/// still bounds the multi-statement SQLite type-change sequence and is
/// harmless elsewhere.
async fn run_ddl(
    db: &DatabaseHandle,
    table: &str,
    statements: &[String],
) -> Result<(), ExecutionError> {
    let mut tx = begin(db).await?;
    for sql in statements {
        sqlx::query(sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| ExecutionError::Ddl {
                table: table.to_string(),
                sql: sql.clone(),
                cause: e.to_string(),
            })?;
    }
    commit(tx).await
}

fn encode_spec(spec: Option<&ColumnSpec>) -> Option<String> {
    spec.and_then(|s| serde_json::to_string(s).ok())
}

fn decode_spec(config: Option<&str>, migration_id: Uuid) -> EngineResult<ColumnSpec> {
    let config = config
        .ok_or_else(|| not_available(migration_id, "the recorded column configuration is missing"))?;
    serde_json::from_str(config).map_err(|_| {
        not_available(
            migration_id,
            "the recorded column configuration is unreadable",
        )
    })
}

fn not_available(migration_id: Uuid, reason: &str) -> EngineError {
    EngineError::RollbackNotAvailable {
        migration_id: migration_id.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Dialect;
    use crate::core::table_spec::ColumnType;

    #[test]
    fn test_forward_and_inverse_statements_for_add() {
        let generator = generator_for(Dialect::PostgreSQL);
        let step = MigrationStep::add_column(
            "form_t",
            ColumnSpec::new("phone", ColumnType::VARCHAR { length: 32 }),
        );

        let forward = forward_statements(generator.as_ref(), &step);
        assert_eq!(
            forward,
            vec!["ALTER TABLE \"form_t\" ADD COLUMN \"phone\" VARCHAR(32)"]
        );

        let inverse = inverse_statements(generator.as_ref(), &step);
        assert_eq!(inverse, vec!["ALTER TABLE \"form_t\" DROP COLUMN \"phone\""]);
    }

    #[test]
    fn test_inverse_of_rename_swaps_names() {
        let generator = generator_for(Dialect::PostgreSQL);
        let step = MigrationStep::rename_column(
            "form_t",
            ColumnSpec::new("email", ColumnType::VARCHAR { length: 255 }),
            "contact_email",
        );

        let inverse = inverse_statements(generator.as_ref(), &step);
        assert_eq!(
            inverse,
            vec!["ALTER TABLE \"form_t\" RENAME COLUMN \"contact_email\" TO \"email\""]
        );
    }

    #[test]
    fn test_inverse_of_modify_reverses_direction() {
        let generator = generator_for(Dialect::MySQL);
        let step = MigrationStep::modify_column(
            "form_t",
            ColumnSpec::new("note", ColumnType::VARCHAR { length: 255 }),
            ColumnSpec::new("note", ColumnType::TEXT),
        );

        let inverse = inverse_statements(generator.as_ref(), &step);
        assert_eq!(
            inverse,
            vec!["ALTER TABLE `form_t` MODIFY COLUMN `note` VARCHAR(255) NULL"]
        );
    }

    #[test]
    fn test_spec_encoding_round_trip() {
        let spec = ColumnSpec::new(
            "amount",
            ColumnType::DECIMAL {
                precision: 18,
                scale: 4,
            },
        );
        let encoded = encode_spec(Some(&spec)).expect("encode");
        let decoded = decode_spec(Some(&encoded), Uuid::nil()).expect("decode");
        assert_eq!(decoded, spec);
    }
}
