// Error types
//
// Typed error taxonomy for the engine, built with thiserror:
// ValidationError (rejected before any DDL), ConflictError (retryable),
// ExecutionError (DDL/query failed against the live database) and
// IntegrityError (row-identity mismatches, surfaced but never auto-fixed),
// all wrapped by the EngineError umbrella.

use thiserror::Error;

/// Validation errors
///
/// Raised before any DDL is executed. A request that fails validation
/// has no effect on the database.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    /// Field type name not in the closed enumeration
    #[error("Unknown field type '{name}'")]
    UnknownFieldType {
        /// The unrecognized type name
        name: String,
    },

    /// Identifier exceeds the configured maximum even after transliteration
    #[error("Identifier '{identifier}' exceeds the maximum length of {max} bytes")]
    IdentifierTooLong {
        /// The offending identifier
        identifier: String,
        /// Configured maximum length
        max: usize,
    },

    /// Field definition is inconsistent with its type
    #[error("Invalid configuration for field '{field}': {reason}")]
    InvalidFieldConfig {
        /// Field title or identifier
        field: String,
        /// Why the configuration was rejected
        reason: String,
    },

    /// Form has no materialized table yet
    #[error("Form '{form}' has not been materialized")]
    FormNotMaterialized {
        /// Form title or identifier
        form: String,
    },

    /// Materialized table name is immutable after first creation
    #[error("Form '{form}' already owns table '{table}'")]
    TableNameAlreadySet {
        /// Form title or identifier
        form: String,
        /// The existing table name
        table: String,
    },
}

impl ValidationError {
    /// Whether this is an unknown-field-type error
    pub fn is_unknown_field_type(&self) -> bool {
        matches!(self, ValidationError::UnknownFieldType { .. })
    }

    /// Whether this is an identifier-length error
    pub fn is_identifier_too_long(&self) -> bool {
        matches!(self, ValidationError::IdentifierTooLong { .. })
    }
}

/// Conflict errors
///
/// The request collided with concurrent or pre-existing state. Callers
/// may retry or escalate; nothing was changed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConflictError {
    /// Target table already exists
    #[error("Table '{table}' already exists")]
    TableExists {
        /// The conflicting table name
        table: String,
    },

    /// The generator's deterministic suffixing could not resolve a collision
    #[error("Identifier '{identifier}' collides within namespace '{namespace}'")]
    IdentifierCollision {
        /// The colliding identifier
        identifier: String,
        /// Namespace (table name space or the owning table's columns)
        namespace: String,
    },

    /// Another migration holds the per-table lock; retry later
    #[error("A migration is already in progress on table '{table}'")]
    MigrationInProgress {
        /// The locked table
        table: String,
    },
}

impl ConflictError {
    /// Whether the caller can simply retry after a short wait
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConflictError::MigrationInProgress { .. })
    }
}

/// Execution errors
///
/// The database rejected an operation. For migrations the attempt is
/// recorded in the ledger as failed and the table is left unchanged.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Connection or pool failure
    #[error("Database connection error: {message} (cause: {cause})")]
    Connection {
        /// What was being attempted
        message: String,
        /// Driver-level cause
        cause: String,
    },

    /// DDL statement failed
    #[error("DDL failed on table '{table}': {cause}")]
    Ddl {
        /// Target table
        table: String,
        /// The failed statement
        sql: String,
        /// Driver-level cause
        cause: String,
    },

    /// Query execution failed
    #[error("Query execution error: {message}")]
    Query {
        /// What was being attempted
        message: String,
        /// The failed SQL, if available
        sql: Option<String>,
    },

    /// Transaction control failure
    #[error("Transaction error: {message}")]
    Transaction {
        /// What was being attempted
        message: String,
    },
}

impl ExecutionError {
    /// Whether this is a connection error
    pub fn is_connection(&self) -> bool {
        matches!(self, ExecutionError::Connection { .. })
    }

    /// Whether this is a DDL error
    pub fn is_ddl(&self) -> bool {
        matches!(self, ExecutionError::Ddl { .. })
    }
}

/// Integrity errors
///
/// Row-identity mismatches detected by reconciliation. Never auto-corrected:
/// guessing which side is authoritative risks silent data loss.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum IntegrityError {
    /// Ledger entry with no matching materialized row
    #[error("Submission '{submission_id}' has no row in table '{table}'")]
    OrphanedLedgerEntry {
        /// Materialized table
        table: String,
        /// Ledger submission identifier
        submission_id: String,
    },

    /// Materialized row whose identifier is missing from the ledger
    #[error("Row '{row_id}' in table '{table}' has no ledger entry")]
    OrphanedRow {
        /// Materialized table
        table: String,
        /// Row identifier
        row_id: String,
    },

    /// Sub-form write referenced a parent row that does not exist
    #[error("Parent row '{parent_id}' not found in table '{table}'")]
    ParentRowMissing {
        /// Parent materialized table
        table: String,
        /// The missing parent row identifier
        parent_id: String,
    },
}

/// Engine error umbrella
#[derive(Debug, Error)]
pub enum EngineError {
    /// Rejected before any DDL ran
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Collision with concurrent or pre-existing state
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    /// The live database rejected an operation
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// Row-identity mismatch
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// Rollback was requested but is no longer (or not yet) possible
    #[error("Rollback of migration '{migration_id}' is not available: {reason}")]
    RollbackNotAvailable {
        /// The migration the caller tried to roll back
        migration_id: String,
        /// Why the rollback cannot run
        reason: String,
    },
}

impl EngineError {
    /// Whether this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, EngineError::Validation(_))
    }

    /// Whether this is a conflict error
    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::Conflict(_))
    }

    /// Whether this is an execution error
    pub fn is_execution(&self) -> bool {
        matches!(self, EngineError::Execution(_))
    }

    /// Whether this is an integrity error
    pub fn is_integrity(&self) -> bool {
        matches!(self, EngineError::Integrity(_))
    }

    /// Whether this is a rollback-availability error
    pub fn is_rollback_not_available(&self) -> bool {
        matches!(self, EngineError::RollbackNotAvailable { .. })
    }
}

/// Result alias used across the engine
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_variants() {
        let unknown = ValidationError::UnknownFieldType {
            name: "hologram".to_string(),
        };
        assert!(unknown.is_unknown_field_type());
        assert!(!unknown.is_identifier_too_long());

        let too_long = ValidationError::IdentifierTooLong {
            identifier: "x".repeat(80),
            max: 63,
        };
        assert!(too_long.is_identifier_too_long());
    }

    #[test]
    fn test_conflict_retryable() {
        let in_progress = ConflictError::MigrationInProgress {
            table: "form_customer_intake".to_string(),
        };
        assert!(in_progress.is_retryable());

        let exists = ConflictError::TableExists {
            table: "form_customer_intake".to_string(),
        };
        assert!(!exists.is_retryable());
    }

    #[test]
    fn test_engine_error_conversions() {
        let err: EngineError = ValidationError::UnknownFieldType {
            name: "hologram".to_string(),
        }
        .into();
        assert!(err.is_validation());

        let err: EngineError = ConflictError::TableExists {
            table: "t".to_string(),
        }
        .into();
        assert!(err.is_conflict());

        let err: EngineError = ExecutionError::Transaction {
            message: "commit failed".to_string(),
        }
        .into();
        assert!(err.is_execution());

        let err: EngineError = IntegrityError::OrphanedRow {
            table: "t".to_string(),
            row_id: "r1".to_string(),
        }
        .into();
        assert!(err.is_integrity());
    }

    #[test]
    fn test_error_messages() {
        let err = EngineError::RollbackNotAvailable {
            migration_id: "m1".to_string(),
            reason: "backup expired".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("m1"));
        assert!(message.contains("backup expired"));
    }
}
