// Core domain models: configuration, errors, forms, fields, table specs,
// migrations and backup snapshots.

pub mod backup;
pub mod config;
pub mod error;
pub mod field;
pub mod form;
pub mod migration;
pub mod table_spec;
