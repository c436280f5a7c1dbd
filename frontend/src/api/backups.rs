use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use super::{
    client::{error_from_response, ApiClient},
    types::{
        ApiError, AutoBackupStatus, BackupListResponse, BackupRecord, CreateBackupRequest,
        RestoreRequest, RestoreResult,
    },
};

const FILENAME_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'_').remove(b'-').remove(b'.');

fn backup_path(filename: &str, suffix: &str) -> String {
    format!(
        "/backups/{}{}",
        utf8_percent_encode(filename, FILENAME_SEGMENT),
        suffix
    )
}

impl ApiClient {
    pub async fn list_backups(&self) -> Result<Vec<BackupRecord>, ApiError> {
        let headers = self.get_auth_headers()?;
        let url = self.url("/backups").await;
        let response: BackupListResponse = self
            .send_json(self.http_client().get(url).headers(headers))
            .await?;
        Ok(response.backups)
    }

    pub async fn create_backup(
        &self,
        description: Option<String>,
    ) -> Result<BackupRecord, ApiError> {
        let headers = self.get_auth_headers()?;
        let url = self.url("/backups").await;
        let body = CreateBackupRequest {
            description: description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
        };
        self.send_json(self.http_client().post(url).headers(headers).json(&body))
            .await
    }

    pub async fn delete_backup(&self, filename: &str) -> Result<(), ApiError> {
        let headers = self.get_auth_headers()?;
        let url = self.url(&backup_path(filename, "")).await;
        self.send_empty(self.http_client().delete(url).headers(headers))
            .await
    }

    /// Never reaches the server without `confirm`.
    pub async fn restore_backup(
        &self,
        filename: &str,
        confirm: bool,
    ) -> Result<RestoreResult, ApiError> {
        if !confirm {
            return Err(ApiError::confirmation_required());
        }
        let headers = self.get_auth_headers()?;
        let url = self.url(&backup_path(filename, "/restore")).await;
        let body = RestoreRequest {
            confirm_restore: true,
        };
        self.send_json(self.http_client().post(url).headers(headers).json(&body))
            .await
    }

    pub async fn download_backup(&self, filename: &str) -> Result<Vec<u8>, ApiError> {
        let headers = self.get_auth_headers()?;
        let url = self.url(&backup_path(filename, "/download")).await;
        let response = self
            .send(self.http_client().get(url).headers(headers))
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::request_failed(format!("Download interrupted: {}", e)))?;
        Ok(bytes.to_vec())
    }

    pub async fn auto_backup_status(&self) -> Result<AutoBackupStatus, ApiError> {
        let headers = self.get_auth_headers()?;
        let url = self.url("/backups/auto-status").await;
        self.send_json(self.http_client().get(url).headers(headers))
            .await
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod host_tests {
    use super::*;
    use crate::api::ApiErrorKind;
    use crate::state::session::{test_tokens::token_expiring_in, SessionGuard};

    #[test]
    fn backup_paths_keep_filenames_readable() {
        assert_eq!(
            backup_path("backup_20260101T000000000Z_pre-restore_0a0b0c0d.sql", "/restore"),
            "/backups/backup_20260101T000000000Z_pre-restore_0a0b0c0d.sql/restore"
        );
        assert_eq!(backup_path("../x", ""), "/backups/..%2Fx");
    }

    #[tokio::test]
    async fn unconfirmed_restore_never_sends_a_request() {
        let session = SessionGuard::in_memory();
        session.store_token(&token_expiring_in(3600));
        // Unroutable address: any request attempt would surface as Transport.
        let api = ApiClient::new_with_base_url("http://127.0.0.1:9/api", session);

        let err = api
            .restore_backup("backup_20260101T000000000Z_manual_0a0b0c0d.sql", false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ApiErrorKind::ConfirmationRequired);
    }

    #[tokio::test]
    async fn calls_without_a_session_fail_as_auth_required() {
        let api = ApiClient::new_with_base_url("http://127.0.0.1:9/api", SessionGuard::in_memory());
        let err = api.list_backups().await.unwrap_err();
        assert_eq!(err.kind(), ApiErrorKind::AuthRequired);
    }
}
