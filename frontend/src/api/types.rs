use chrono::{DateTime, Utc};
use leptos::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub role: String,
}

impl UserResponse {
    pub fn is_admin(&self) -> bool {
        self.role.eq_ignore_ascii_case("admin")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackupKind {
    Manual,
    PreRestore,
    Auto,
}

impl BackupKind {
    pub fn label(&self) -> &'static str {
        match self {
            BackupKind::Manual => "Manual",
            BackupKind::PreRestore => "Pre-restore",
            BackupKind::Auto => "Automatic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub filename: String,
    pub size: String,
    pub actual_size: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: BackupKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupListResponse {
    pub backups: Vec<BackupRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateBackupRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreRequest {
    pub confirm_restore: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoreResult {
    pub restored_from: String,
    pub pre_restore_backup: BackupRecord,
    pub restart_required: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoBackupStatus {
    pub enabled: bool,
    pub schedule: String,
    pub retention_days: u32,
    pub last_backup_at: Option<DateTime<Utc>>,
    pub next_backup_at: Option<DateTime<Utc>>,
}

/// Failure classes the UI reacts to differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    AuthRequired,
    Forbidden,
    NotFound,
    ConfirmationRequired,
    Conflict,
    BadRequest,
    PartialRestoreFailure,
    Transport,
    InvalidResponse,
    Server,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for ApiError {}

impl From<ApiError> for String {
    fn from(error: ApiError) -> Self {
        error.error
    }
}

impl IntoView for ApiError {
    fn into_view(self) -> View {
        self.user_message().into_view()
    }
}

impl ApiError {
    fn with_code(msg: impl Into<String>, code: &str) -> Self {
        Self {
            error: msg.into(),
            code: code.to_string(),
            details: None,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::with_code(msg, "VALIDATION_ERROR")
    }

    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::with_code(msg, "UNKNOWN")
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::with_code(msg, "REQUEST_FAILED")
    }

    pub fn timeout(after: std::time::Duration) -> Self {
        Self::with_code(
            format!("Request timed out after {}s", after.as_secs()),
            "TIMEOUT",
        )
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::with_code(msg, "INVALID_RESPONSE")
    }

    pub fn auth_required() -> Self {
        Self::with_code("Authentication required", "UNAUTHORIZED")
    }

    pub fn confirmation_required() -> Self {
        Self::with_code(
            "Restore requires explicit confirmation",
            "CONFIRMATION_REQUIRED",
        )
    }

    /// Envelope for a non-success status whose body was not an error
    /// envelope.
    pub fn from_status(status: u16) -> Self {
        let code = match status {
            400 => "BAD_REQUEST",
            401 => "UNAUTHORIZED",
            403 => "FORBIDDEN",
            404 => "NOT_FOUND",
            409 => "CONFLICT",
            _ => "INTERNAL_SERVER_ERROR",
        };
        Self::with_code(format!("Request failed with status {}", status), code)
    }

    pub fn kind(&self) -> ApiErrorKind {
        match self.code.as_str() {
            "UNAUTHORIZED" => ApiErrorKind::AuthRequired,
            "FORBIDDEN" => ApiErrorKind::Forbidden,
            "NOT_FOUND" => ApiErrorKind::NotFound,
            "CONFIRMATION_REQUIRED" => ApiErrorKind::ConfirmationRequired,
            "CONFLICT" | "RESTORE_IN_PROGRESS" => ApiErrorKind::Conflict,
            "BAD_REQUEST" | "VALIDATION_ERROR" | "INVALID_FILENAME" => ApiErrorKind::BadRequest,
            "PARTIAL_RESTORE_FAILURE" => ApiErrorKind::PartialRestoreFailure,
            "REQUEST_FAILED" | "TIMEOUT" => ApiErrorKind::Transport,
            "INVALID_RESPONSE" => ApiErrorKind::InvalidResponse,
            _ => ApiErrorKind::Server,
        }
    }

    /// Safety backup named by a partial restore failure.
    pub fn pre_restore_backup(&self) -> Option<&str> {
        self.details
            .as_ref()?
            .get("pre_restore_backup")?
            .as_str()
    }

    /// Text telling the operator what happened and what to do next.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ApiErrorKind::AuthRequired => {
                "Your session has ended. Please sign in again.".to_string()
            }
            ApiErrorKind::Forbidden => {
                "Your account is not allowed to do this. Ask an administrator.".to_string()
            }
            ApiErrorKind::NotFound => format!(
                "{}. The list may be out of date; refresh and try again.",
                self.error
            ),
            ApiErrorKind::ConfirmationRequired => {
                "Restoring replaces all current data and must be confirmed first.".to_string()
            }
            ApiErrorKind::Conflict => format!(
                "{}. Wait for the running operation to finish, then retry.",
                self.error
            ),
            ApiErrorKind::PartialRestoreFailure => match self.pre_restore_backup() {
                Some(safety) => format!(
                    "Restore failed partway and the data may be inconsistent. \
                     Restore the safety backup {} to recover. ({})",
                    safety, self.error
                ),
                None => format!(
                    "Restore failed partway and the data may be inconsistent. ({})",
                    self.error
                ),
            },
            ApiErrorKind::Transport => format!(
                "Could not reach the server: {}. Check your connection and retry.",
                self.error
            ),
            ApiErrorKind::InvalidResponse => format!(
                "The server sent an unexpected response: {}",
                self.error
            ),
            ApiErrorKind::BadRequest | ApiErrorKind::Server => self.error.clone(),
        }
    }
}
