// Per-table migration locks
//
// In-process serialization of structural changes: at most one migration
// runs against a table at a time, and submission writes to a table wait
// for a migration in flight on it. Waiters time out with a retryable
// conflict instead of queueing forever.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;

use crate::core::error::ConflictError;

/// Guard released when the holding operation finishes
pub type TableLockGuard = OwnedMutexGuard<()>;

/// Registry of per-table locks
#[derive(Debug)]
pub struct TableLockRegistry {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    wait_timeout: Duration,
}

impl TableLockRegistry {
    /// Create a registry whose waiters give up after `wait_timeout_secs`
    pub fn new(wait_timeout_secs: u64) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            wait_timeout: Duration::from_secs(wait_timeout_secs),
        }
    }

    /// Acquire the lock for a table, waiting up to the configured timeout
    pub async fn acquire(&self, table: &str) -> Result<TableLockGuard, ConflictError> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(table.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        timeout(self.wait_timeout, lock.lock_owned())
            .await
            .map_err(|_| ConflictError::MigrationInProgress {
                table: table.to_string(),
            })
    }
}

impl Default for TableLockRegistry {
    fn default() -> Self {
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequential_acquire_release() {
        let registry = TableLockRegistry::new(1);

        let guard = registry.acquire("form_a").await.expect("free lock");
        drop(guard);
        registry.acquire("form_a").await.expect("released lock");
    }

    #[tokio::test]
    async fn test_different_tables_do_not_contend() {
        let registry = TableLockRegistry::new(1);

        let _a = registry.acquire("form_a").await.expect("free lock");
        registry
            .acquire("form_b")
            .await
            .expect("other table is independent");
    }

    #[tokio::test(start_paused = true)]
    async fn test_held_lock_times_out_as_retryable_conflict() {
        let registry = TableLockRegistry::new(1);

        let _held = registry.acquire("form_a").await.expect("free lock");
        let err = registry
            .acquire("form_a")
            .await
            .expect_err("second acquire should time out");

        assert!(matches!(err, ConflictError::MigrationInProgress { .. }));
        assert!(err.is_retryable());
    }
}
