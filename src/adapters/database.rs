// Database connection handle
//
// A dependency-injected wrapper around a sqlx AnyPool plus the dialect it
// speaks. Constructed once at process start and passed down explicitly so
// tests can substitute an isolated instance; closed gracefully at shutdown.

use sqlx::pool::PoolOptions;
use sqlx::{Any, AnyPool};
use std::time::Duration;

use crate::adapters::connection_string;
use crate::core::config::{DatabaseConfig, Dialect};
use crate::core::error::ExecutionError;

/// Shared database handle
#[derive(Debug, Clone)]
pub struct DatabaseHandle {
    pool: AnyPool,
    dialect: Dialect,
}

impl DatabaseHandle {
    /// Connect using per-environment settings
    pub async fn connect(
        dialect: Dialect,
        config: &DatabaseConfig,
    ) -> Result<Self, ExecutionError> {
        let url = connection_string::build_connection_string(dialect, config);
        Self::connect_url(dialect, &url, pool_options_from_config(config)).await
    }

    /// Connect to an explicit URL with the given pool options
    pub async fn connect_url(
        dialect: Dialect,
        url: &str,
        options: PoolOptions<Any>,
    ) -> Result<Self, ExecutionError> {
        sqlx::any::install_default_drivers();

        let pool = options
            .connect(url)
            .await
            .map_err(|e| ExecutionError::Connection {
                message: format!("Failed to create database connection pool: {}", dialect),
                cause: e.to_string(),
            })?;

        Ok(Self { pool, dialect })
    }

    /// The underlying pool
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// The dialect this handle speaks
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Verify the connection with a trivial query
    pub async fn ping(&self) -> Result<(), ExecutionError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| ExecutionError::Connection {
                message: "Database connection test failed".to_string(),
                cause: e.to_string(),
            })
    }

    /// Close the pool gracefully
    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Derive pool options from the environment settings
pub fn pool_options_from_config(config: &DatabaseConfig) -> PoolOptions<Any> {
    let max_conn = config.max_connections.unwrap_or(5);
    let timeout = config.timeout.unwrap_or(30);

    PoolOptions::new()
        .max_connections(max_conn)
        .acquire_timeout(Duration::from_secs(timeout))
}
