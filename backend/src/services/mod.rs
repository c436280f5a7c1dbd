pub mod backup;
pub mod backup_scheduler;
pub mod pg_dump;

pub use backup::{BackupError, BackupService, DatabaseDumper};
pub use backup_scheduler::AutoBackupScheduler;
pub use pg_dump::PgDumpDumper;
