use crate::api::{ApiError, ApiErrorKind};
use leptos::*;

fn validation_messages(error: &ApiError) -> Vec<String> {
    if error.code != "VALIDATION_ERROR" {
        return Vec::new();
    }
    error
        .details
        .as_ref()
        .and_then(|details| details.get("errors"))
        .and_then(|errors| errors.as_array())
        .map(|errors| {
            errors
                .iter()
                .filter_map(|err| err.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn visible_code(error: &ApiError) -> Option<String> {
    match error.code.as_str() {
        "" | "UNKNOWN" => None,
        code => Some(code.to_string()),
    }
}

#[component]
pub fn InlineErrorMessage(error: Signal<Option<ApiError>>) -> impl IntoView {
    view! {
        <Show when=move || error.get().is_some() fallback=|| ()>
            <div
                class="bg-status-error-bg border border-status-error-border text-status-error-text px-4 py-3 rounded space-y-1 my-2"
                role="alert"
            >
                <div class="font-bold">{move || error.get().map(|e| e.user_message()).unwrap_or_default()}</div>
                {move || error.get().map(|e| {
                    let details = validation_messages(&e);
                    if !details.is_empty() {
                        return view! {
                            <ul class="list-disc list-inside text-sm">
                                {details.into_iter().map(|msg| view! { <li>{msg}</li> }).collect_view()}
                            </ul>
                        }.into_view();
                    }
                    if e.kind() == ApiErrorKind::PartialRestoreFailure {
                        return view! {
                            <div class="text-sm font-semibold">
                                "The database may be in an inconsistent state."
                            </div>
                        }.into_view();
                    }
                    match visible_code(&e) {
                        Some(code) => view! { <div class="text-xs opacity-75">{"Code: "}{code}</div> }.into_view(),
                        None => ().into_view(),
                    }
                }).unwrap_or_else(|| ().into_view())}
            </div>
        </Show>
    }
}
