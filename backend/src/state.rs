use std::sync::Arc;

use crate::{
    config::Config,
    repositories::UserRepository,
    services::{AutoBackupScheduler, BackupService, DatabaseDumper},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub users: Arc<dyn UserRepository>,
    pub backups: Arc<BackupService>,
    pub scheduler: Arc<AutoBackupScheduler>,
}

impl AppState {
    pub fn new(
        config: Config,
        users: Arc<dyn UserRepository>,
        dumper: Arc<dyn DatabaseDumper>,
    ) -> Self {
        let backups = Arc::new(BackupService::new(
            config.backup.dir.clone(),
            dumper,
            config.backup.command_timeout(),
        ));
        let scheduler = Arc::new(AutoBackupScheduler::new(
            backups.clone(),
            config.backup.clone(),
        ));
        Self {
            config,
            users,
            backups,
            scheduler,
        }
    }
}
