// Formbase library entry point
//
// Module structure:
// - cli: CLI layer (user input and command routing)
// - core: core domain models (forms, fields, table specs, migrations, backups)
// - adapters: database access and per-dialect SQL generation
// - services: materialization, migration planning/execution, backups,
//   the migration ledger and row-identity synchronization
// - engine: the facade wiring the services together

pub mod cli;
pub mod core;
pub mod adapters;
pub mod services;
pub mod engine;
