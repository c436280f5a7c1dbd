//! Backup metadata exchanged over the backup endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Origin of a snapshot.
pub enum BackupKind {
    /// Requested explicitly by an administrator.
    Manual,
    /// Taken automatically right before a restore replaced the database.
    PreRestore,
    /// Produced by the scheduled background job.
    Auto,
}

impl BackupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupKind::Manual => "manual",
            BackupKind::PreRestore => "pre-restore",
            BackupKind::Auto => "auto",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "manual" => Some(BackupKind::Manual),
            "pre-restore" => Some(BackupKind::PreRestore),
            "auto" => Some(BackupKind::Auto),
            _ => None,
        }
    }

    /// Whether the retention policy may delete backups of this kind.
    pub fn is_prunable(&self) -> bool {
        !matches!(self, BackupKind::Manual)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub filename: String,
    /// Human readable size such as `"1.5 MB"`.
    pub size: String,
    /// Size on disk in bytes.
    pub actual_size: u64,
    pub created_at: DateTime<Utc>,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: BackupKind,
}

/// Metadata persisted next to each dump as `<filename>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: BackupKind,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CreateBackupRequest {
    #[validate(length(max = 500))]
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BackupListResponse {
    pub backups: Vec<BackupRecord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreRequest {
    #[serde(default)]
    pub confirm_restore: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreResult {
    pub restored_from: String,
    pub pre_restore_backup: BackupRecord,
    /// The running application must be restarted or reloaded to observe a
    /// consistent database.
    pub restart_required: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoBackupStatus {
    pub enabled: bool,
    pub schedule: String,
    pub retention_days: u32,
    pub last_backup_at: Option<DateTime<Utc>>,
    pub next_backup_at: Option<DateTime<Utc>>,
}

/// Formats a byte count the way the admin page displays it.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_size_picks_largest_unit() {
        assert_eq!(human_size(0), "0 B");
        assert_eq!(human_size(1023), "1023 B");
        assert_eq!(human_size(1536), "1.5 KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn kind_serializes_as_kebab_case() {
        assert_eq!(
            serde_json::to_string(&BackupKind::PreRestore).unwrap(),
            "\"pre-restore\""
        );
        assert_eq!(BackupKind::parse("auto"), Some(BackupKind::Auto));
        assert_eq!(BackupKind::parse("weekly"), None);
        assert!(!BackupKind::Manual.is_prunable());
        assert!(BackupKind::PreRestore.is_prunable());
    }

    #[test]
    fn restore_request_reads_camel_case_flag() {
        let req: RestoreRequest = serde_json::from_str(r#"{"confirmRestore":true}"#).unwrap();
        assert!(req.confirm_restore);
        let req: RestoreRequest = serde_json::from_str("{}").unwrap();
        assert!(!req.confirm_restore);
    }
}
