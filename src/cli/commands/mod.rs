// Command handlers.

pub mod gc_backups;
pub mod init;
pub mod reconcile;
pub mod rollback;
pub mod status;
