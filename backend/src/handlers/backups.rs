use axum::{
    body::Body,
    extract::{Extension, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tokio_util::io::ReaderStream;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        backup::{
            AutoBackupStatus, BackupListResponse, BackupRecord, CreateBackupRequest,
            RestoreRequest, RestoreResult,
        },
        user::User,
    },
    state::AppState,
};

pub async fn create_backup(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    payload: Option<Json<CreateBackupRequest>>,
) -> Result<(StatusCode, Json<BackupRecord>), AppError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    payload.validate()?;

    tracing::info!(user_id = %user.id, "Manual backup requested");
    let record = state.backups.create_backup(payload.description).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_backups(
    State(state): State<AppState>,
) -> Result<Json<BackupListResponse>, AppError> {
    let backups = state.backups.list_backups().await?;
    Ok(Json(BackupListResponse { backups }))
}

pub async fn download_backup(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let (record, file) = state.backups.open_backup(&filename).await?;
    tracing::info!(user_id = %user.id, filename = %record.filename, "Streaming backup download");

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        record.filename
    ))
    .map_err(|e| AppError::InternalServerError(e.into()))?;
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, HeaderValue::from(record.actual_size)),
        ],
        body,
    )
        .into_response())
}

pub async fn delete_backup(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(filename): Path<String>,
) -> Result<StatusCode, AppError> {
    tracing::info!(user_id = %user.id, filename = %filename, "Backup deletion requested");
    state.backups.delete_backup(&filename).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restore_backup(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(filename): Path<String>,
    payload: Option<Json<RestoreRequest>>,
) -> Result<Json<RestoreResult>, AppError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    tracing::warn!(
        user_id = %user.id,
        filename = %filename,
        confirmed = payload.confirm_restore,
        "Restore requested"
    );
    let result = state
        .backups
        .restore(&filename, payload.confirm_restore)
        .await?;
    Ok(Json(result))
}

pub async fn auto_backup_status(
    State(state): State<AppState>,
) -> Result<Json<AutoBackupStatus>, AppError> {
    Ok(Json(state.scheduler.status().await?))
}
