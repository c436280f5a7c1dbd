//! Full-database snapshot management.
//!
//! [`BackupService`] owns the backup directory: every snapshot is a plain SQL
//! dump (`<filename>`) with a JSON sidecar (`<filename>.json`) describing it.
//! The actual dump/replace work is delegated to a [`DatabaseDumper`].

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::RngCore;
use thiserror::Error;
use tokio::fs;

use crate::models::backup::{human_size, BackupKind, BackupMetadata, BackupRecord, RestoreResult};

const FILENAME_PREFIX: &str = "backup_";
const DUMP_EXTENSION: &str = ".sql";
const SIDECAR_EXTENSION: &str = ".json";
const PARTIAL_EXTENSION: &str = ".partial";

/// Persistence boundary used to take and apply full snapshots.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DatabaseDumper: Send + Sync {
    /// Writes a complete snapshot of the live database to `destination`.
    async fn dump(&self, destination: &Path) -> anyhow::Result<()>;

    /// Replaces the live database with the snapshot stored at `source`.
    async fn restore(&self, source: &Path) -> anyhow::Result<()>;
}

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Backup '{0}' not found")]
    NotFound(String),
    #[error("Restore requires explicit confirmation")]
    ConfirmationRequired,
    #[error("Invalid backup filename: {0}")]
    InvalidFilename(String),
    #[error("A restore is already in progress")]
    RestoreInProgress,
    #[error("Backup failed: {0}")]
    BackupFailed(String),
    #[error("Pre-restore backup failed, restore aborted: {0}")]
    PreRestoreBackupFailed(String),
    #[error(
        "Restore failed after safety backup '{pre_restore_backup}' was created; \
         the database may be inconsistent: {message}"
    )]
    PartialRestoreFailure {
        pre_restore_backup: String,
        message: String,
    },
    #[error("Backup storage error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct BackupService {
    dir: PathBuf,
    dumper: Arc<dyn DatabaseDumper>,
    dump_timeout: Duration,
    restoring: AtomicBool,
}

/// Clears the restore flag on every exit path of [`BackupService::restore`].
struct RestoreGuard<'a>(&'a AtomicBool);

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl BackupService {
    pub fn new(
        dir: impl Into<PathBuf>,
        dumper: Arc<dyn DatabaseDumper>,
        dump_timeout: Duration,
    ) -> Self {
        Self {
            dir: dir.into(),
            dumper,
            dump_timeout,
            restoring: AtomicBool::new(false),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_restoring(&self) -> bool {
        self.restoring.load(Ordering::Acquire)
    }

    /// Takes a manual snapshot of the current database.
    ///
    /// Concurrent calls are not serialized; each produces its own uniquely
    /// named record.
    pub async fn create_backup(
        &self,
        description: Option<String>,
    ) -> Result<BackupRecord, BackupError> {
        self.ensure_not_restoring()?;
        let description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| "Manual backup".to_string());
        self.snapshot(BackupKind::Manual, description).await
    }

    /// Snapshot taken by the scheduled job.
    pub async fn create_scheduled_backup(&self) -> Result<BackupRecord, BackupError> {
        self.ensure_not_restoring()?;
        self.snapshot(BackupKind::Auto, "Scheduled automatic backup".to_string())
            .await
    }

    /// Every snapshot in the backup directory, newest first.
    pub async fn list_backups(&self) -> Result<Vec<BackupRecord>, BackupError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !is_backup_filename(&name) {
                continue;
            }
            match self.load_record(&name).await {
                Ok(record) => records.push(record),
                // Deleted between read_dir and stat.
                Err(BackupError::NotFound(_)) => continue,
                Err(err) => return Err(err),
            }
        }

        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.filename.cmp(&a.filename))
        });
        Ok(records)
    }

    pub async fn get_backup(&self, filename: &str) -> Result<BackupRecord, BackupError> {
        validate_filename(filename)?;
        self.load_record(filename).await
    }

    /// Opens a snapshot for streaming to the caller.
    pub async fn open_backup(
        &self,
        filename: &str,
    ) -> Result<(BackupRecord, fs::File), BackupError> {
        let record = self.get_backup(filename).await?;
        let file = fs::File::open(self.dump_path(filename))
            .await
            .map_err(|err| not_found_or_io(err, filename))?;
        Ok((record, file))
    }

    /// Removes a snapshot; a missing file is reported, never ignored.
    pub async fn delete_backup(&self, filename: &str) -> Result<(), BackupError> {
        self.ensure_not_restoring()?;
        validate_filename(filename)?;
        self.remove_files(filename).await?;
        tracing::info!(filename, "Deleted backup");
        Ok(())
    }

    /// Replaces the live database with `filename`.
    ///
    /// A `pre-restore` snapshot of the current state is always written and
    /// persisted before the replace step starts. Once the replace step has
    /// begun it runs to completion.
    pub async fn restore(
        &self,
        filename: &str,
        confirm: bool,
    ) -> Result<RestoreResult, BackupError> {
        if !confirm {
            return Err(BackupError::ConfirmationRequired);
        }
        let source = self.get_backup(filename).await?;

        if self
            .restoring
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(BackupError::RestoreInProgress);
        }
        let _guard = RestoreGuard(&self.restoring);

        tracing::warn!(filename = %source.filename, "Starting database restore");

        let safety = self
            .snapshot(
                BackupKind::PreRestore,
                format!("Automatic backup before restoring {}", source.filename),
            )
            .await
            .map_err(|err| {
                tracing::error!(error = %err, filename = %source.filename, "Pre-restore backup failed; restore aborted");
                BackupError::PreRestoreBackupFailed(err.to_string())
            })?;

        if let Err(err) = self.dumper.restore(&self.dump_path(&source.filename)).await {
            tracing::error!(
                error = ?err,
                filename = %source.filename,
                pre_restore_backup = %safety.filename,
                "Restore failed after safety backup was created"
            );
            return Err(BackupError::PartialRestoreFailure {
                pre_restore_backup: safety.filename,
                message: format!("{:#}", err),
            });
        }

        tracing::warn!(
            filename = %source.filename,
            pre_restore_backup = %safety.filename,
            "Database restored; application restart required"
        );
        Ok(RestoreResult {
            message: format!(
                "Database restored from {}. Restart the application to reload its state.",
                source.filename
            ),
            restored_from: source.filename,
            pre_restore_backup: safety,
            restart_required: true,
        })
    }

    /// Hard-deletes prunable snapshots older than `retention_days`.
    /// Manual backups are never pruned.
    pub async fn prune_expired(
        &self,
        retention_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, BackupError> {
        let cutoff = now - chrono::Duration::days(i64::from(retention_days));
        let mut removed = Vec::new();
        for record in self.list_backups().await? {
            if !record.kind.is_prunable() || record.created_at >= cutoff {
                continue;
            }
            match self.remove_files(&record.filename).await {
                Ok(()) => {
                    tracing::info!(filename = %record.filename, kind = record.kind.as_str(), "Pruned expired backup");
                    removed.push(record.filename);
                }
                Err(BackupError::NotFound(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(removed)
    }

    /// Most recent snapshot of the given kind, if any.
    pub async fn latest_of_kind(
        &self,
        kind: BackupKind,
    ) -> Result<Option<BackupRecord>, BackupError> {
        Ok(self
            .list_backups()
            .await?
            .into_iter()
            .find(|record| record.kind == kind))
    }

    fn ensure_not_restoring(&self) -> Result<(), BackupError> {
        if self.is_restoring() {
            Err(BackupError::RestoreInProgress)
        } else {
            Ok(())
        }
    }

    async fn snapshot(
        &self,
        kind: BackupKind,
        description: String,
    ) -> Result<BackupRecord, BackupError> {
        fs::create_dir_all(&self.dir).await?;

        let created_at = Utc::now();
        let filename = generate_filename(kind, created_at);
        let final_path = self.dump_path(&filename);
        let partial_path = self.dir.join(format!("{}{}", filename, PARTIAL_EXTENSION));

        tracing::info!(filename = %filename, kind = kind.as_str(), "Creating backup");

        let dumped = tokio::time::timeout(self.dump_timeout, self.dumper.dump(&partial_path)).await;
        let dump_error = match dumped {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(format!("{:#}", err)),
            Err(_) => Some(format!(
                "database dump timed out after {}s",
                self.dump_timeout.as_secs()
            )),
        };
        if let Some(message) = dump_error {
            discard(&partial_path).await;
            tracing::error!(filename = %filename, error = %message, "Backup failed");
            return Err(BackupError::BackupFailed(message));
        }

        if let Err(err) = fs::rename(&partial_path, &final_path).await {
            discard(&partial_path).await;
            return Err(BackupError::BackupFailed(err.to_string()));
        }

        let metadata = BackupMetadata {
            created_at,
            description,
            kind,
        };
        if let Err(err) = write_sidecar(&self.sidecar_path(&filename), &metadata).await {
            discard(&final_path).await;
            return Err(BackupError::BackupFailed(err.to_string()));
        }

        let record = self.load_record(&filename).await?;
        tracing::info!(filename = %record.filename, size = record.actual_size, "Backup created");
        Ok(record)
    }

    async fn load_record(&self, filename: &str) -> Result<BackupRecord, BackupError> {
        let file_meta = fs::metadata(self.dump_path(filename))
            .await
            .map_err(|err| not_found_or_io(err, filename))?;
        if !file_meta.is_file() {
            return Err(BackupError::NotFound(filename.to_string()));
        }

        let sidecar = read_sidecar(&self.sidecar_path(filename)).await;
        let (created_at, description, kind) = match sidecar {
            Some(meta) => (meta.created_at, meta.description, meta.kind),
            None => {
                let created_at = file_meta
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());
                let kind = kind_from_filename(filename).unwrap_or(BackupKind::Manual);
                (created_at, String::new(), kind)
            }
        };

        Ok(BackupRecord {
            filename: filename.to_string(),
            size: human_size(file_meta.len()),
            actual_size: file_meta.len(),
            created_at,
            description,
            kind,
        })
    }

    async fn remove_files(&self, filename: &str) -> Result<(), BackupError> {
        fs::remove_file(self.dump_path(filename))
            .await
            .map_err(|err| not_found_or_io(err, filename))?;
        match fs::remove_file(self.sidecar_path(filename)).await {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    fn dump_path(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    fn sidecar_path(&self, filename: &str) -> PathBuf {
        self.dir.join(format!("{}{}", filename, SIDECAR_EXTENSION))
    }
}

/// `backup_<UTC timestamp>_<kind>_<suffix>.sql`; sorts by creation time.
pub fn generate_filename(kind: BackupKind, created_at: DateTime<Utc>) -> String {
    let mut suffix = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut suffix);
    format!(
        "{}{}_{}_{}{}",
        FILENAME_PREFIX,
        created_at.format("%Y%m%dT%H%M%S%3fZ"),
        kind.as_str(),
        hex::encode(suffix),
        DUMP_EXTENSION
    )
}

pub fn is_backup_filename(name: &str) -> bool {
    name.starts_with(FILENAME_PREFIX)
        && name.ends_with(DUMP_EXTENSION)
        && name.len() > FILENAME_PREFIX.len() + DUMP_EXTENSION.len()
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Rejects anything that could escape the backup directory. A safe name
/// that is not one of ours cannot be in the listing, so it is `NotFound`.
pub fn validate_filename(name: &str) -> Result<(), BackupError> {
    let safe = !name.is_empty()
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !safe {
        return Err(BackupError::InvalidFilename(name.to_string()));
    }
    if !is_backup_filename(name) {
        return Err(BackupError::NotFound(name.to_string()));
    }
    Ok(())
}

fn kind_from_filename(name: &str) -> Option<BackupKind> {
    name.trim_end_matches(DUMP_EXTENSION)
        .split('_')
        .nth(2)
        .and_then(BackupKind::parse)
}

fn not_found_or_io(err: std::io::Error, filename: &str) -> BackupError {
    if err.kind() == std::io::ErrorKind::NotFound {
        BackupError::NotFound(filename.to_string())
    } else {
        BackupError::Io(err)
    }
}

async fn discard(path: &Path) {
    if let Err(err) = fs::remove_file(path).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %err, "Failed to remove incomplete backup file");
        }
    }
}

async fn write_sidecar(path: &Path, metadata: &BackupMetadata) -> std::io::Result<()> {
    let body = serde_json::to_vec_pretty(metadata).map_err(std::io::Error::other)?;
    fs::write(path, body).await
}

async fn read_sidecar(path: &Path) -> Option<BackupMetadata> {
    let bytes = fs::read(path).await.ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(meta) => Some(meta),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "Ignoring unreadable backup metadata");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_with(dumper: MockDatabaseDumper, dir: &Path) -> BackupService {
        BackupService::new(dir, Arc::new(dumper), Duration::from_secs(5))
    }

    fn writing_dumper() -> MockDatabaseDumper {
        let mut dumper = MockDatabaseDumper::new();
        dumper.expect_dump().returning(|path| {
            std::fs::write(path, b"-- dump\nSELECT 1;\n")?;
            Ok(())
        });
        dumper
    }

    #[test]
    fn generated_filenames_are_valid_and_unique() {
        let now = Utc::now();
        let a = generate_filename(BackupKind::Manual, now);
        let b = generate_filename(BackupKind::Manual, now);
        assert_ne!(a, b);
        assert!(is_backup_filename(&a));
        assert_eq!(kind_from_filename(&a), Some(BackupKind::Manual));
        let pre = generate_filename(BackupKind::PreRestore, now);
        assert_eq!(kind_from_filename(&pre), Some(BackupKind::PreRestore));
    }

    #[test]
    fn generated_filenames_sort_by_creation_time() {
        let earlier = Utc::now() - chrono::Duration::seconds(5);
        let later = Utc::now();
        let a = generate_filename(BackupKind::Auto, earlier);
        let b = generate_filename(BackupKind::Auto, later);
        assert!(a < b);
    }

    #[test]
    fn validate_filename_rejects_traversal() {
        assert!(validate_filename("../etc/passwd").is_err());
        assert!(validate_filename("backup_../../x.sql").is_err());
        assert!(validate_filename("backup_a/b.sql").is_err());
        assert!(validate_filename("").is_err());
        assert!(matches!(
            validate_filename("notes.sql"),
            Err(BackupError::NotFound(_))
        ));
        assert!(matches!(
            validate_filename("backup_.sql"),
            Err(BackupError::NotFound(_))
        ));
        assert!(validate_filename("backup_20260101T000000000Z_manual_0a0b0c0d.sql").is_ok());
    }

    #[tokio::test]
    async fn restore_without_confirmation_never_touches_dumper() {
        let dir = tempfile::tempdir().unwrap();
        let mut dumper = MockDatabaseDumper::new();
        dumper.expect_dump().never();
        dumper.expect_restore().never();
        let service = service_with(dumper, dir.path());

        let err = service
            .restore("backup_20260101T000000000Z_manual_0a0b0c0d.sql", false)
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::ConfirmationRequired));
    }

    #[tokio::test]
    async fn failed_dump_leaves_no_files_behind() {
        let dir = tempfile::tempdir().unwrap();
        let mut dumper = MockDatabaseDumper::new();
        dumper.expect_dump().returning(|path| {
            std::fs::write(path, b"partial")?;
            Err(anyhow::anyhow!("disk full"))
        });
        let service = service_with(dumper, dir.path());

        let err = service.create_backup(None).await.unwrap_err();
        assert!(matches!(err, BackupError::BackupFailed(ref msg) if msg.contains("disk full")));
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn restore_reports_partial_failure_with_safety_backup() {
        let dir = tempfile::tempdir().unwrap();
        let mut dumper = writing_dumper();
        dumper
            .expect_restore()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("psql exited with status 3")));
        let service = service_with(dumper, dir.path());

        let source = service.create_backup(Some("before".into())).await.unwrap();
        let err = service.restore(&source.filename, true).await.unwrap_err();
        let pre_restore_backup = match err {
            BackupError::PartialRestoreFailure {
                pre_restore_backup, ..
            } => pre_restore_backup,
            other => panic!("expected partial restore failure, got {other:?}"),
        };
        let safety = service.get_backup(&pre_restore_backup).await.unwrap();
        assert_eq!(safety.kind, BackupKind::PreRestore);
        assert!(!service.is_restoring());
    }

    #[tokio::test]
    async fn default_description_applies_to_blank_input() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_with(writing_dumper(), dir.path());
        let record = service.create_backup(Some("   ".into())).await.unwrap();
        assert_eq!(record.description, "Manual backup");
        assert_eq!(record.kind, BackupKind::Manual);
        assert!(record.actual_size > 0);
    }
}
