use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::{sync::RwLock, task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::backup::{BackupError, BackupService};
use crate::{
    config::BackupConfig,
    models::backup::{AutoBackupStatus, BackupKind, BackupRecord},
};

#[derive(Debug, Default, Clone)]
struct SchedulerState {
    last_backup_at: Option<DateTime<Utc>>,
    next_backup_at: Option<DateTime<Utc>>,
}

/// Periodic `auto` snapshots followed by retention pruning.
pub struct AutoBackupScheduler {
    service: Arc<BackupService>,
    config: BackupConfig,
    state: RwLock<SchedulerState>,
}

impl AutoBackupScheduler {
    pub fn new(service: Arc<BackupService>, config: BackupConfig) -> Self {
        Self {
            service,
            config,
            state: RwLock::new(SchedulerState::default()),
        }
    }

    pub async fn status(&self) -> Result<AutoBackupStatus, BackupError> {
        let state = self.state.read().await.clone();
        let last_backup_at = match state.last_backup_at {
            Some(at) => Some(at),
            None => self
                .service
                .latest_of_kind(BackupKind::Auto)
                .await?
                .map(|record| record.created_at),
        };
        Ok(AutoBackupStatus {
            enabled: self.config.auto_enabled,
            schedule: self.config.schedule_label(),
            retention_days: self.config.retention_days,
            last_backup_at,
            next_backup_at: if self.config.auto_enabled {
                state.next_backup_at
            } else {
                None
            },
        })
    }

    /// One scheduled cycle: snapshot, then prune. Pruning still runs when
    /// the snapshot fails.
    pub async fn run_once(&self) -> Result<BackupRecord, BackupError> {
        let created = self.service.create_scheduled_backup().await;
        if let Ok(record) = &created {
            self.state.write().await.last_backup_at = Some(record.created_at);
        }

        match self
            .service
            .prune_expired(self.config.retention_days, Utc::now())
            .await
        {
            Ok(removed) if !removed.is_empty() => {
                tracing::info!(count = removed.len(), "Retention pruning removed backups");
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "Retention pruning failed"),
        }

        created
    }

    /// Starts the background loop; `None` when auto backups are disabled.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        if !self.config.auto_enabled {
            tracing::info!("Automatic backups disabled");
            return None;
        }
        let period = self.config.auto_interval();
        tracing::info!(
            schedule = %self.config.schedule_label(),
            retention_days = self.config.retention_days,
            "Automatic backups enabled"
        );

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; wait a full period instead.
            ticker.tick().await;

            loop {
                self.state.write().await.next_backup_at =
                    chrono::Duration::from_std(period).ok().map(|d| Utc::now() + d);

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::info!("Automatic backup scheduler stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        match self.run_once().await {
                            Ok(record) => tracing::info!(filename = %record.filename, "Scheduled backup completed"),
                            Err(err) => tracing::error!(error = %err, "Scheduled backup failed"),
                        }
                    }
                }
            }
        }))
    }
}
