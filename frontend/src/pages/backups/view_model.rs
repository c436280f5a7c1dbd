use super::repository::BackupsRepository;
use crate::api::{
    ApiError, ApiErrorKind, AutoBackupStatus, BackupRecord, RestoreResult,
};
use crate::state::auth::{use_api_client, use_auth, AuthState};
use chrono::{DateTime, Utc};
use leptos::*;
use std::rc::Rc;

pub const DESCRIPTION_MAX_CHARS: usize = 500;

/// Restore request as it leaves the confirmation dialog.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreCommand {
    pub filename: String,
    pub confirmed: bool,
}

#[derive(Clone, Copy)]
pub struct BackupsViewModel {
    pub description: RwSignal<String>,
    pub error: RwSignal<Option<ApiError>>,
    pub notice: RwSignal<Option<String>>,
    pub pending_delete: RwSignal<Option<String>>,
    pub pending_restore: RwSignal<Option<String>>,
    pub last_restore: RwSignal<Option<RestoreResult>>,
    pub reload: RwSignal<u32>,
    pub backups_resource: Resource<u32, Result<Vec<BackupRecord>, ApiError>>,
    pub status_resource: Resource<u32, Result<AutoBackupStatus, ApiError>>,
    pub create_action: Action<Option<String>, Result<BackupRecord, ApiError>>,
    pub delete_action: Action<String, Result<String, ApiError>>,
    pub restore_action: Action<RestoreCommand, Result<RestoreResult, ApiError>>,
    pub download_action: Action<String, Result<String, ApiError>>,
}

impl BackupsViewModel {
    pub fn is_busy(&self) -> bool {
        self.create_action.pending().get()
            || self.delete_action.pending().get()
            || self.restore_action.pending().get()
    }

    pub fn submit_create(&self) {
        match normalize_description(&self.description.get_untracked()) {
            Ok(description) => {
                self.error.set(None);
                self.notice.set(None);
                self.create_action.dispatch(description);
            }
            Err(err) => self.error.set(Some(err)),
        }
    }

    pub fn request_delete(&self, filename: String) {
        self.pending_restore.set(None);
        self.pending_delete.set(Some(filename));
    }

    pub fn cancel_delete(&self) {
        self.pending_delete.set(None);
    }

    pub fn confirm_delete(&self) {
        if let Some(filename) = self.pending_delete.get_untracked() {
            self.pending_delete.set(None);
            self.error.set(None);
            self.delete_action.dispatch(filename);
        }
    }

    pub fn request_restore(&self, filename: String) {
        self.pending_delete.set(None);
        self.pending_restore.set(Some(filename));
    }

    pub fn cancel_restore(&self) {
        self.pending_restore.set(None);
    }

    pub fn confirm_restore(&self) {
        if let Some(filename) = self.pending_restore.get_untracked() {
            self.pending_restore.set(None);
            self.error.set(None);
            self.notice.set(None);
            self.restore_action.dispatch(RestoreCommand {
                filename,
                confirmed: true,
            });
        }
    }

    pub fn download(&self, filename: String) {
        self.error.set(None);
        self.download_action.dispatch(filename);
    }

    fn refresh(&self) {
        self.reload.update(|value| *value = value.wrapping_add(1));
    }
}

pub fn use_backups_view_model() -> BackupsViewModel {
    let repo = BackupsRepository::new_with_client(Rc::new(use_api_client()));
    let (_auth, set_auth) = use_auth();

    let description = create_rw_signal(String::new());
    let error = create_rw_signal(None::<ApiError>);
    let notice = create_rw_signal(None::<String>);
    let pending_delete = create_rw_signal(None::<String>);
    let pending_restore = create_rw_signal(None::<String>);
    let last_restore = create_rw_signal(None::<RestoreResult>);
    let reload = create_rw_signal(0u32);

    let repo_list = repo.clone();
    let backups_resource = create_resource(
        move || reload.get(),
        move |_| {
            let repo = repo_list.clone();
            async move { repo.list().await }
        },
    );

    let repo_status = repo.clone();
    let status_resource = create_resource(
        move || reload.get(),
        move |_| {
            let repo = repo_status.clone();
            async move { repo.auto_status().await }
        },
    );

    let repo_create = repo.clone();
    let create_action = create_action(move |description: &Option<String>| {
        let repo = repo_create.clone();
        let description = description.clone();
        async move { repo.create(description).await }
    });

    let repo_delete = repo.clone();
    let delete_action = leptos::create_action(move |filename: &String| {
        let repo = repo_delete.clone();
        let filename = filename.clone();
        async move { repo.delete(&filename).await.map(|_| filename) }
    });

    let repo_restore = repo.clone();
    let restore_action = leptos::create_action(move |command: &RestoreCommand| {
        let repo = repo_restore.clone();
        let command = command.clone();
        async move { repo.restore(&command.filename, command.confirmed).await }
    });

    let repo_download = repo;
    let download_action = leptos::create_action(move |filename: &String| {
        let repo = repo_download.clone();
        let filename = filename.clone();
        async move {
            let bytes = repo.download(&filename).await?;
            crate::utils::trigger_bytes_download(&filename, &bytes)
                .map_err(ApiError::unknown)?;
            Ok(filename)
        }
    });

    let vm = BackupsViewModel {
        description,
        error,
        notice,
        pending_delete,
        pending_restore,
        last_restore,
        reload,
        backups_resource,
        status_resource,
        create_action,
        delete_action,
        restore_action,
        download_action,
    };

    let report = move |err: ApiError| {
        if err.kind() == ApiErrorKind::AuthRequired {
            set_auth.set(AuthState::default());
        }
        error.set(Some(err));
    };

    create_effect(move |_| {
        if let Some(result) = create_action.value().get() {
            match result {
                Ok(record) => {
                    description.set(String::new());
                    notice.set(Some(format!("Backup {} created", record.filename)));
                    vm.refresh();
                }
                Err(err) => report(err),
            }
        }
    });

    create_effect(move |_| {
        if let Some(result) = delete_action.value().get() {
            match result {
                Ok(filename) => {
                    notice.set(Some(format!("Backup {} deleted", filename)));
                    vm.refresh();
                }
                Err(err) => {
                    // A stale row is the usual cause of NotFound.
                    if err.kind() == ApiErrorKind::NotFound {
                        vm.refresh();
                    }
                    report(err);
                }
            }
        }
    });

    create_effect(move |_| {
        if let Some(result) = restore_action.value().get() {
            match result {
                Ok(outcome) => {
                    notice.set(Some(restore_success_notice(&outcome)));
                    last_restore.set(Some(outcome));
                    vm.refresh();
                }
                Err(err) => {
                    if err.kind() == ApiErrorKind::PartialRestoreFailure {
                        vm.refresh();
                    }
                    report(err);
                }
            }
        }
    });

    create_effect(move |_| {
        if let Some(Err(err)) = download_action.value().get() {
            report(err);
        }
    });

    vm
}

pub fn normalize_description(raw: &str) -> Result<Option<String>, ApiError> {
    let trimmed = raw.trim();
    if trimmed.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(ApiError::validation(format!(
            "Description must be at most {} characters",
            DESCRIPTION_MAX_CHARS
        )));
    }
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

pub fn restore_confirmation_message(filename: &str) -> String {
    format!(
        "Restoring {} replaces ALL current data. A safety backup of the current \
         database is taken first. The application must be restarted afterwards.",
        filename
    )
}

pub fn delete_confirmation_message(filename: &str) -> String {
    format!("Delete backup {}? This cannot be undone.", filename)
}

pub fn restore_success_notice(result: &RestoreResult) -> String {
    format!(
        "Restored from {}. Safety backup {} was created. Restart the application now.",
        result.restored_from, result.pre_restore_backup.filename
    )
}

pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M UTC").to_string()
}

pub fn auto_status_summary(status: &AutoBackupStatus) -> String {
    if !status.enabled {
        return "Automatic backups are disabled".to_string();
    }
    let last = status
        .last_backup_at
        .as_ref()
        .map(format_timestamp)
        .unwrap_or_else(|| "never".to_string());
    let next = status
        .next_backup_at
        .as_ref()
        .map(format_timestamp)
        .unwrap_or_else(|| "not scheduled".to_string());
    format!(
        "Automatic backups {}; kept for {} days. Last: {}. Next: {}.",
        status.schedule, status.retention_days, last, next
    )
}


#[cfg(all(test, not(target_arch = "wasm32")))]
mod host_tests {
    use super::*;
    use crate::test_support::ssr::with_offline_runtime;

    #[test]
    fn dialogs_are_mutually_exclusive() {
        with_offline_runtime(|| {
            let vm = use_backups_view_model();
            vm.request_delete("backup_a.sql".into());
            assert_eq!(vm.pending_delete.get(), Some("backup_a.sql".to_string()));

            vm.request_restore("backup_b.sql".into());
            assert_eq!(vm.pending_delete.get(), None);
            assert_eq!(vm.pending_restore.get(), Some("backup_b.sql".to_string()));

            vm.cancel_restore();
            assert_eq!(vm.pending_restore.get(), None);
        });
    }

    #[test]
    fn confirm_without_pending_restore_dispatches_nothing() {
        with_offline_runtime(|| {
            let vm = use_backups_view_model();
            vm.confirm_restore();
            vm.confirm_delete();
            assert_eq!(vm.restore_action.version().get(), 0);
            assert_eq!(vm.delete_action.version().get(), 0);
        });
    }

    #[test]
    fn invalid_description_blocks_create() {
        with_offline_runtime(|| {
            let vm = use_backups_view_model();
            vm.description.set("x".repeat(DESCRIPTION_MAX_CHARS + 10));
            vm.submit_create();
            assert_eq!(
                vm.error.get().map(|e| e.code),
                Some("VALIDATION_ERROR".to_string())
            );
            assert_eq!(vm.create_action.version().get(), 0);
        });
    }
}
