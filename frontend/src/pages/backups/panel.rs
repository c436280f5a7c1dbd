use super::view_model::{
    auto_status_summary, delete_confirmation_message, format_timestamp,
    restore_confirmation_message, use_backups_view_model, BackupsViewModel, DESCRIPTION_MAX_CHARS,
};
use crate::api::{BackupKind, BackupRecord};
use crate::components::{
    confirm_dialog::ConfirmDialog,
    error::InlineErrorMessage,
    layout::{ErrorMessage, LoadingSpinner, SuccessMessage},
};
use leptos::*;

const ROW_BUTTON_CLASS: &str =
    "px-2 py-1 text-xs font-medium rounded border border-border hover:bg-action-ghost-bg-hover disabled:opacity-50";

#[component]
pub fn BackupsPanel() -> impl IntoView {
    let vm = use_backups_view_model();

    view! {
        <div class="space-y-6">
            <AutoStatusCard vm=vm />
            <CreateBackupCard vm=vm />
            <InlineErrorMessage error=vm.error.into() />
            {move || vm.notice.get().map(|message| view! { <SuccessMessage message=message /> })}
            <RestartNotice vm=vm />
            <BackupTable vm=vm />
            <ConfirmDialog
                is_open=Signal::derive(move || vm.pending_delete.get().is_some())
                title="Delete backup"
                message=Signal::derive(move || {
                    vm.pending_delete
                        .get()
                        .map(|f| delete_confirmation_message(&f))
                        .unwrap_or_default()
                })
                confirm_label="Delete"
                on_confirm=Callback::new(move |_| vm.confirm_delete())
                on_cancel=Callback::new(move |_| vm.cancel_delete())
                destructive=true
            />
            <ConfirmDialog
                is_open=Signal::derive(move || vm.pending_restore.get().is_some())
                title="Restore database"
                message=Signal::derive(move || {
                    vm.pending_restore
                        .get()
                        .map(|f| restore_confirmation_message(&f))
                        .unwrap_or_default()
                })
                confirm_label="Restore"
                confirm_phrase=Signal::derive(move || vm.pending_restore.get())
                on_confirm=Callback::new(move |_| vm.confirm_restore())
                on_cancel=Callback::new(move |_| vm.cancel_restore())
                destructive=true
            />
        </div>
    }
}

#[component]
fn AutoStatusCard(vm: BackupsViewModel) -> impl IntoView {
    view! {
        <div class="bg-surface-elevated shadow rounded-lg p-4 text-sm text-fg-muted">
            <Suspense fallback=|| view! { <span>"Loading schedule..."</span> }>
                {move || vm.status_resource.get().map(|result| match result {
                    Ok(status) => view! { <span>{auto_status_summary(&status)}</span> }.into_view(),
                    Err(err) => view! { <span>{err.user_message()}</span> }.into_view(),
                })}
            </Suspense>
        </div>
    }
}

#[component]
fn CreateBackupCard(vm: BackupsViewModel) -> impl IntoView {
    let creating = vm.create_action.pending();
    view! {
        <div class="bg-surface-elevated shadow rounded-lg p-6 space-y-3">
            <h2 class="text-lg font-medium text-fg">"Backups"</h2>
            <div class="flex flex-col gap-3 md:flex-row md:items-end">
                <label class="flex-1 text-sm text-fg">
                    <span class="block mb-1">"Description (optional)"</span>
                    <input
                        type="text"
                        maxlength=DESCRIPTION_MAX_CHARS
                        class="w-full border border-border rounded px-3 py-2"
                        placeholder="Manual backup"
                        prop:value=move || vm.description.get()
                        on:input=move |ev| vm.description.set(event_target_value(&ev))
                    />
                </label>
                <button
                    type="button"
                    class="px-4 py-2 rounded-md text-sm font-semibold bg-action-primary-bg text-action-primary-text hover:bg-action-primary-bg-hover disabled:opacity-50"
                    disabled=move || vm.is_busy()
                    on:click=move |_| vm.submit_create()
                >
                    {move || if creating.get() { "Creating..." } else { "Create backup" }}
                </button>
            </div>
        </div>
    }
}

#[component]
fn RestartNotice(vm: BackupsViewModel) -> impl IntoView {
    view! {
        <Show when=move || vm.last_restore.get().map(|r| r.restart_required).unwrap_or(false)>
            <div
                class="bg-status-warning-bg border border-status-warning-border text-status-warning-text px-4 py-3 rounded"
                role="alert"
            >
                <p class="font-semibold">"Restart required"</p>
                <p class="text-sm">
                    {move || vm.last_restore.get().map(|r| r.message).unwrap_or_default()}
                </p>
            </div>
        </Show>
    }
}

#[component]
fn BackupTable(vm: BackupsViewModel) -> impl IntoView {
    let restoring = vm.restore_action.pending();
    view! {
        <div class="bg-surface-elevated shadow rounded-lg overflow-x-auto">
            <Show when=move || restoring.get()>
                <div class="px-4 py-2 text-sm font-semibold text-status-warning-text">
                    "Restore in progress. Do not close this tab."
                </div>
            </Show>
            <Suspense fallback=|| view! { <LoadingSpinner /> }>
                {move || vm.backups_resource.get().map(|result| match result {
                    Ok(records) if records.is_empty() => view! {
                        <p class="p-6 text-sm text-fg-muted">"No backups yet."</p>
                    }.into_view(),
                    Ok(records) => view! {
                        <table class="min-w-full divide-y divide-border text-sm">
                            <thead>
                                <tr class="text-left text-fg-muted">
                                    <th class="px-4 py-2">"Created"</th>
                                    <th class="px-4 py-2">"Type"</th>
                                    <th class="px-4 py-2">"Size"</th>
                                    <th class="px-4 py-2">"Description"</th>
                                    <th class="px-4 py-2">"File"</th>
                                    <th class="px-4 py-2"></th>
                                </tr>
                            </thead>
                            <tbody>
                                {records.into_iter().map(|record| view! { <BackupRow vm=vm record=record /> }).collect_view()}
                            </tbody>
                        </table>
                    }.into_view(),
                    Err(err) => view! { <ErrorMessage message=err.user_message() /> }.into_view(),
                })}
            </Suspense>
        </div>
    }
}

fn kind_badge_class(kind: BackupKind) -> &'static str {
    match kind {
        BackupKind::Manual => "bg-surface-muted text-fg",
        BackupKind::Auto => "bg-status-info-bg text-status-info-text",
        BackupKind::PreRestore => "bg-status-warning-bg text-status-warning-text",
    }
}

#[component]
fn BackupRow(vm: BackupsViewModel, record: BackupRecord) -> impl IntoView {
    let download_name = record.filename.clone();
    let delete_name = record.filename.clone();
    let restore_name = record.filename.clone();
    let downloading = vm.download_action.pending();
    view! {
        <tr class="border-t border-border">
            <td class="px-4 py-2 whitespace-nowrap">{format_timestamp(&record.created_at)}</td>
            <td class="px-4 py-2">
                <span class=format!("px-2 py-0.5 rounded text-xs {}", kind_badge_class(record.kind))>
                    {record.kind.label()}
                </span>
            </td>
            <td class="px-4 py-2 whitespace-nowrap">{record.size.clone()}</td>
            <td class="px-4 py-2">{record.description.clone()}</td>
            <td class="px-4 py-2 font-mono text-xs">{record.filename.clone()}</td>
            <td class="px-4 py-2 whitespace-nowrap space-x-2">
                <button
                    type="button"
                    class=ROW_BUTTON_CLASS
                    disabled=move || downloading.get()
                    on:click=move |_| vm.download(download_name.clone())
                >
                    "Download"
                </button>
                <button
                    type="button"
                    class=ROW_BUTTON_CLASS
                    disabled=move || vm.is_busy()
                    on:click=move |_| vm.request_restore(restore_name.clone())
                >
                    "Restore"
                </button>
                <button
                    type="button"
                    class=ROW_BUTTON_CLASS
                    disabled=move || vm.is_busy()
                    on:click=move |_| vm.request_delete(delete_name.clone())
                >
                    "Delete"
                </button>
            </td>
        </tr>
    }
}

#[cfg(test)]
mod tests {
    use super::kind_badge_class;
    use crate::api::BackupKind;

    #[test]
    fn pre_restore_backups_stand_out() {
        assert_ne!(
            kind_badge_class(BackupKind::PreRestore),
            kind_badge_class(BackupKind::Manual)
        );
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod host_tests {
    use super::BackupsPanel;
    use crate::test_support::helpers::{admin_user, provide_auth};
    use crate::test_support::ssr::render_to_string;
    use leptos::*;

    #[test]
    fn backups_panel_renders_create_form_without_dialogs() {
        let html = render_to_string(|| {
            provide_auth(Some(admin_user()), false);
            view! { <BackupsPanel /> }
        });
        assert!(html.contains("Create backup"));
        assert!(html.contains("Description (optional)"));
        assert!(!html.contains("role=\"dialog\""));
    }
}
