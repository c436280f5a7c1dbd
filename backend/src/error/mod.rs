use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::services::backup::BackupError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    BadRequest(String),
    InternalServerError(anyhow::Error),
    Validation(Vec<String>),
    Backup(BackupError),
}

impl AppError {
    fn parts(self) -> (StatusCode, String, &'static str, Option<Value>) {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND", None),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, "UNAUTHORIZED", None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, "FORBIDDEN", None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, "CONFLICT", None),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "BAD_REQUEST", None),
            AppError::InternalServerError(err) => {
                tracing::error!("Internal server error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_SERVER_ERROR",
                    None,
                )
            }
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "Validation failed".to_string(),
                "VALIDATION_ERROR",
                Some(serde_json::json!({ "errors": errors })),
            ),
            AppError::Backup(err) => backup_parts(err),
        }
    }
}

fn backup_parts(err: BackupError) -> (StatusCode, String, &'static str, Option<Value>) {
    let message = err.to_string();
    match err {
        BackupError::NotFound(_) => (StatusCode::NOT_FOUND, message, "NOT_FOUND", None),
        BackupError::ConfirmationRequired => (
            StatusCode::BAD_REQUEST,
            message,
            "CONFIRMATION_REQUIRED",
            None,
        ),
        BackupError::InvalidFilename(_) => {
            (StatusCode::BAD_REQUEST, message, "INVALID_FILENAME", None)
        }
        BackupError::RestoreInProgress => {
            (StatusCode::CONFLICT, message, "RESTORE_IN_PROGRESS", None)
        }
        BackupError::BackupFailed(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
            "BACKUP_FAILED",
            None,
        ),
        BackupError::PreRestoreBackupFailed(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
            "PRE_RESTORE_BACKUP_FAILED",
            None,
        ),
        BackupError::PartialRestoreFailure {
            pre_restore_backup, ..
        } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
            "PARTIAL_RESTORE_FAILURE",
            Some(serde_json::json!({ "pre_restore_backup": pre_restore_backup })),
        ),
        BackupError::Io(io) => {
            tracing::error!(error = %io, "Backup storage error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                message,
                "BACKUP_STORAGE_ERROR",
                None,
            )
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, code, details) = self.parts();
        let body = Json(ErrorResponse {
            error,
            code: code.to_string(),
            details,
        });
        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalServerError(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            _ => AppError::InternalServerError(err.into()),
        }
    }
}

impl From<BackupError> for AppError {
    fn from(err: BackupError) -> Self {
        AppError::Backup(err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let code = e.code.as_ref();
                    format!("{}: {}", field, code)
                })
            })
            .collect();
        AppError::Validation(messages)
    }
}
