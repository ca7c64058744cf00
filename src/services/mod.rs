// Services: identifier generation, type mapping, materialization,
// migration planning/execution, backups, the migration ledger and
// row-identity synchronization.

pub mod backup_store;
pub mod executor;
pub mod form_store;
pub mod identifier;
pub mod identity;
pub mod ledger;
pub mod materializer;
pub mod planner;
pub mod table_locks;
pub mod type_mapping;
