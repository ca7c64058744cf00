// Backup snapshot model
//
// A snapshot is a full column extract taken immediately before a
// destructive change. It is immutable after creation; restores read it,
// the retention sweep deletes it, nothing ever rewrites it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::table_spec::ColumnType;

/// One captured row of a column snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Row identity
    pub row_id: String,

    /// Column value rendered as text; None preserves SQL NULL
    pub value: Option<String>,
}

/// Immutable pre-change capture of one column's data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupSnapshot {
    /// Snapshot identifier
    pub id: Uuid,

    /// Source table
    pub table_name: String,

    /// Source column
    pub column_name: String,

    /// Column type at capture time, used to restore with the right cast
    pub column_type: ColumnType,

    /// Captured {row id, value} pairs
    pub entries: Vec<SnapshotEntry>,

    /// Capture time
    pub taken_at: DateTime<Utc>,

    /// Garbage-collection deadline
    pub retain_until: DateTime<Utc>,

    /// Set when a rollback consumed this snapshot; held snapshots survive
    /// the sweep until an operator releases them
    pub hold: bool,
}

impl BackupSnapshot {
    /// Create a snapshot with a retention deadline relative to now
    pub fn new(
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        column_type: ColumnType,
        entries: Vec<SnapshotEntry>,
        retention_days: i64,
    ) -> Self {
        let taken_at = Utc::now();
        Self {
            id: Uuid::new_v4(),
            table_name: table_name.into(),
            column_name: column_name.into(),
            column_type,
            entries,
            taken_at,
            retain_until: taken_at + Duration::days(retention_days),
            hold: false,
        }
    }

    /// Number of captured rows
    pub fn row_count(&self) -> usize {
        self.entries.len()
    }

    /// Whether the sweep may delete this snapshot at the given instant
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !self.hold && now > self.retain_until
    }
}

/// Result of replaying a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreReport {
    /// Rows whose value was written back
    pub restored: u64,

    /// Captured rows that no longer exist; skipped, never recreated
    pub skipped: u64,
}

/// Result of a retention sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepReport {
    /// Snapshots deleted
    pub deleted: u64,

    /// Snapshots that failed to delete; logged and skipped
    pub failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_snapshot(retention_days: i64) -> BackupSnapshot {
        BackupSnapshot::new(
            "form_customer_intake",
            "email",
            ColumnType::VARCHAR { length: 255 },
            vec![
                SnapshotEntry {
                    row_id: "r1".to_string(),
                    value: Some("a@example.com".to_string()),
                },
                SnapshotEntry {
                    row_id: "r2".to_string(),
                    value: None,
                },
            ],
            retention_days,
        )
    }

    #[test]
    fn test_retention_deadline() {
        let snapshot = sample_snapshot(90);
        assert_eq!(snapshot.retain_until - snapshot.taken_at, Duration::days(90));
        assert_eq!(snapshot.row_count(), 2);
    }

    #[test]
    fn test_expiry_check() {
        let snapshot = sample_snapshot(90);
        assert!(!snapshot.is_expired(Utc::now()));
        assert!(snapshot.is_expired(Utc::now() + Duration::days(91)));
    }

    #[test]
    fn test_hold_blocks_expiry() {
        let mut snapshot = sample_snapshot(90);
        snapshot.hold = true;
        assert!(!snapshot.is_expired(Utc::now() + Duration::days(365)));
    }

    #[test]
    fn test_entries_preserve_null() {
        let snapshot = sample_snapshot(90);
        let json = serde_json::to_string(&snapshot.entries).expect("entries should serialize");
        let decoded: Vec<SnapshotEntry> =
            serde_json::from_str(&json).expect("entries should deserialize");
        assert_eq!(decoded, snapshot.entries);
        assert_eq!(decoded[1].value, None);
    }
}
