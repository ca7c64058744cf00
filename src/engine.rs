// Engine facade
//
// Wires the services together behind one entry point. Every service is
// stateless over the shared database handle; the per-table lock registry
// is the only piece of shared in-process state, so the materializer,
// executor and identity synchronizer all serialize on the same locks.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::adapters::database::DatabaseHandle;
use crate::core::backup::SweepReport;
use crate::core::config::EngineConfig;
use crate::core::error::EngineResult;
use crate::core::field::Field;
use crate::core::form::{Form, SubForm, Submission, SubmissionStatus};
use crate::core::migration::{MigrationOutcome, MigrationRecord, MigrationStep, RollbackOutcome};
use crate::services::backup_store::BackupStore;
use crate::services::executor::MigrationExecutor;
use crate::services::form_store::FormStore;
use crate::services::identifier::IdentifierGenerator;
use crate::services::identity::{ColumnValue, ReconcileReport, RowIdentitySynchronizer};
use crate::services::ledger::{MigrationLedger, SqlMigrationLedger};
use crate::services::materializer::TableMaterializer;
use crate::services::planner::MigrationPlanner;
use crate::services::table_locks::TableLockRegistry;

/// The form-to-table engine
pub struct SchemaEngine {
    db: DatabaseHandle,
    store: FormStore,
    materializer: TableMaterializer,
    planner: MigrationPlanner,
    executor: MigrationExecutor,
    identity: RowIdentitySynchronizer,
    backups: BackupStore,
    ledger: SqlMigrationLedger,
}

impl SchemaEngine {
    /// Assemble an engine over a connected database handle
    pub fn new(db: DatabaseHandle, config: &EngineConfig) -> Self {
        let locks = Arc::new(TableLockRegistry::new(config.lock_wait_timeout_secs));
        let identifier = IdentifierGenerator::new(config.max_identifier_length);
        let backups = BackupStore::new(config.backup_retention_days);

        Self {
            db,
            store: FormStore::new(),
            materializer: TableMaterializer::new(identifier),
            planner: MigrationPlanner::new(),
            executor: MigrationExecutor::new(backups.clone(), Arc::clone(&locks)),
            identity: RowIdentitySynchronizer::new(locks),
            backups,
            ledger: SqlMigrationLedger::new(),
        }
    }

    /// Create the engine's own state tables if they do not exist yet
    pub async fn init(&self) -> EngineResult<()> {
        self.store.init_state_tables(&self.db).await?;
        Ok(())
    }

    /// The underlying database handle
    pub fn db(&self) -> &DatabaseHandle {
        &self.db
    }

    /// Materialize a form as a live table
    pub async fn create_table(&self, form: &mut Form) -> EngineResult<String> {
        self.materializer.create_table(&self.db, form).await
    }

    /// Materialize a sub-form as a child table of an existing parent table
    pub async fn create_sub_form_table(
        &self,
        parent_table: &str,
        sub_form: &mut SubForm,
    ) -> EngineResult<String> {
        self.materializer
            .create_sub_form_table(&self.db, parent_table, sub_form)
            .await
    }

    /// Plan the structural steps from an old field list to a new one
    pub fn plan_migration(
        &self,
        table: &str,
        old_fields: &[Field],
        new_fields: &[Field],
    ) -> EngineResult<Vec<MigrationStep>> {
        self.planner.plan(table, old_fields, new_fields)
    }

    /// Execute one planned step
    pub async fn execute_migration(
        &self,
        step: &MigrationStep,
        actor: &str,
    ) -> EngineResult<MigrationOutcome> {
        self.executor.execute(&self.db, step, actor).await
    }

    /// Execute a whole plan, stopping at the first failure
    pub async fn execute_plan(
        &self,
        steps: &[MigrationStep],
        actor: &str,
    ) -> EngineResult<Vec<MigrationOutcome>> {
        self.executor.execute_plan(&self.db, steps, actor).await
    }

    /// Roll back a previously applied migration
    pub async fn rollback(&self, migration_id: Uuid) -> EngineResult<RollbackOutcome> {
        self.executor.rollback(&self.db, migration_id).await
    }

    /// Persist a field definition against an already materialized form
    pub async fn register_field(
        &self,
        form_id: Uuid,
        field: &Field,
    ) -> EngineResult<()> {
        let materialized = field.materializes() && field.column_name.is_some();
        self.store
            .insert_field(&self.db, form_id, field, materialized)
            .await?;
        Ok(())
    }

    /// Write a submission and its materialized row under one identity
    pub async fn create_submission(
        &self,
        form_id: Uuid,
        table: &str,
        values: &[ColumnValue],
        submitted_by: &str,
        status: SubmissionStatus,
    ) -> EngineResult<Submission> {
        self.identity
            .create_submission(&self.db, form_id, table, values, submitted_by, status)
            .await
    }

    /// Write a sub-form submission linked to an existing parent row
    #[allow(clippy::too_many_arguments)]
    pub async fn create_sub_submission(
        &self,
        sub_form_id: Uuid,
        table: &str,
        parent_table: &str,
        parent_row_id: &str,
        values: &[ColumnValue],
        submitted_by: &str,
        status: SubmissionStatus,
    ) -> EngineResult<Submission> {
        self.identity
            .create_sub_submission(
                &self.db,
                sub_form_id,
                table,
                parent_table,
                parent_row_id,
                values,
                submitted_by,
                status,
            )
            .await
    }

    /// Compare ledger identities against a table's row identities
    pub async fn reconcile_identities(&self, table: &str) -> EngineResult<ReconcileReport> {
        self.identity.reconcile(&self.db, table).await
    }

    /// Delete expired, unheld backup snapshots
    pub async fn sweep_backups(&self) -> EngineResult<SweepReport> {
        Ok(self.backups.sweep_expired(&self.db, Utc::now()).await?)
    }

    /// Release a snapshot held by a completed rollback back to normal
    /// retention
    pub async fn release_backup_hold(&self, backup_id: Uuid) -> EngineResult<()> {
        Ok(self.backups.release_hold(&self.db, backup_id).await?)
    }

    /// Physical form tables that no form claims
    pub async fn find_orphan_tables(&self) -> EngineResult<Vec<String>> {
        self.materializer.find_orphan_tables(&self.db).await
    }

    /// Migration history for one table, newest first
    pub async fn migration_history(&self, table: &str) -> EngineResult<Vec<MigrationRecord>> {
        Ok(self.ledger.list_for_table(&self.db, table).await?)
    }

    /// Most recent migrations across all tables
    pub async fn recent_migrations(&self, limit: i64) -> EngineResult<Vec<MigrationRecord>> {
        Ok(self.ledger.list_recent(&self.db, limit).await?)
    }

    /// Every table name currently owned by a form or sub-form
    pub async fn claimed_tables(&self) -> EngineResult<Vec<String>> {
        Ok(self.store.list_claimed_tables(&self.db).await?)
    }
}
