use crate::api::{ApiClient, ApiError, AutoBackupStatus, BackupRecord, RestoreResult};
use std::rc::Rc;

#[derive(Clone)]
pub struct BackupsRepository {
    client: Rc<ApiClient>,
}

impl Default for BackupsRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl BackupsRepository {
    pub fn new() -> Self {
        Self {
            client: Rc::new(ApiClient::new()),
        }
    }

    pub fn new_with_client(client: Rc<ApiClient>) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<BackupRecord>, ApiError> {
        self.client.list_backups().await
    }

    pub async fn auto_status(&self) -> Result<AutoBackupStatus, ApiError> {
        self.client.auto_backup_status().await
    }

    pub async fn create(&self, description: Option<String>) -> Result<BackupRecord, ApiError> {
        self.client.create_backup(description).await
    }

    pub async fn delete(&self, filename: &str) -> Result<(), ApiError> {
        self.client.delete_backup(filename).await
    }

    pub async fn restore(&self, filename: &str, confirm: bool) -> Result<RestoreResult, ApiError> {
        self.client.restore_backup(filename, confirm).await
    }

    pub async fn download(&self, filename: &str) -> Result<Vec<u8>, ApiError> {
        self.client.download_backup(filename).await
    }
}
