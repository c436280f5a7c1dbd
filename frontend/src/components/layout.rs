use crate::{
    router::{ROUTE_BACKUPS, ROUTE_LOGIN},
    state::auth::{use_auth, use_logout},
};
use leptos::*;

const NAV_LINK_CLASS: &str =
    "text-fg-muted hover:text-fg px-3 py-2 rounded-md text-sm font-medium hover:bg-action-ghost-bg-hover";

#[component]
pub fn Header() -> impl IntoView {
    let (auth, _set_auth) = use_auth();
    let logout = use_logout();
    let display_name = move || {
        auth.get()
            .user
            .map(|user| user.full_name)
            .unwrap_or_default()
    };
    let is_admin = move || {
        auth.get()
            .user
            .as_ref()
            .map(|user| user.is_admin())
            .unwrap_or(false)
    };
    let on_logout = move |_| {
        logout.call(());
        if let Some(win) = web_sys::window() {
            if let Err(err) = win.location().set_href(ROUTE_LOGIN) {
                log::warn!("Redirect after logout failed: {:?}", err);
            }
        }
    };
    view! {
        <header class="bg-surface-elevated shadow-sm border-b border-border">
            <div class="max-w-7xl mx-auto px-4 sm:px-6 lg:px-8">
                <div class="flex justify-between items-center h-16">
                    <h1 class="text-xl font-semibold text-fg">"Ledgerdesk"</h1>
                    <nav class="flex items-center space-x-4">
                        <Show when=is_admin>
                            <a href=ROUTE_BACKUPS class=NAV_LINK_CLASS>"Backups"</a>
                        </Show>
                        <span class="text-sm text-fg-muted">{display_name}</span>
                        <Show when=move || auth.get().is_authenticated>
                            <button type="button" on:click=on_logout class=NAV_LINK_CLASS>
                                "Sign out"
                            </button>
                        </Show>
                    </nav>
                </div>
            </div>
        </header>
    }
}

#[component]
pub fn Layout(children: Children) -> impl IntoView {
    view! {
        <div class="min-h-screen bg-surface">
            <Header/>
            <main class="max-w-7xl mx-auto py-6 sm:px-6 lg:px-8">
                {children()}
            </main>
        </div>
    }
}

#[component]
pub fn LoadingSpinner() -> impl IntoView {
    view! {
        <div class="flex justify-center items-center p-8">
            <div class="animate-spin rounded-full h-8 w-8 border-b-2 border-action-primary-bg"></div>
        </div>
    }
}

#[component]
pub fn ErrorMessage(#[prop(into)] message: String) -> impl IntoView {
    view! {
        <div class="bg-status-error-bg border border-status-error-border text-status-error-text px-4 py-3 rounded mb-4" role="alert">
            <p class="text-sm">{message}</p>
        </div>
    }
}

#[component]
pub fn SuccessMessage(#[prop(into)] message: String) -> impl IntoView {
    view! {
        <div class="bg-status-success-bg border border-status-success-border text-status-success-text px-4 py-3 rounded mb-4" role="status">
            <p class="text-sm">{message}</p>
        </div>
    }
}
