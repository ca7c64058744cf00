// Adapters: database connectivity and per-dialect SQL generation.

pub mod connection_string;
pub mod database;
pub mod sql_generator;
pub mod sql_quote;
