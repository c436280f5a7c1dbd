use crate::{
    api::UserResponse, components::layout::LoadingSpinner, router::ROUTE_LOGIN,
    state::auth::use_auth,
};
use leptos::*;

fn redirect_to(path: &str) {
    if let Some(win) = web_sys::window() {
        if let Err(err) = win.location().set_href(path) {
            log::warn!("Redirect to {} failed: {:?}", path, err);
        }
    }
}

#[component]
pub fn RequireAuth(children: ChildrenFn) -> impl IntoView {
    let (auth, _) = use_auth();
    let is_authenticated = create_memo(move |_| auth.get().is_authenticated);
    let is_loading = create_memo(move |_| auth.get().loading);
    create_effect(move |_| {
        let state = auth.get();
        if state.loading || state.is_authenticated {
            return;
        }
        redirect_to(ROUTE_LOGIN);
    });
    view! {
        <Show
            when=move || should_render_children(is_authenticated.get(), is_loading.get())
            fallback=move || {
                if is_loading.get() {
                    view! { <LoadingSpinner /> }.into_view()
                } else {
                    ().into_view()
                }
            }
        >
            {children()}
        </Show>
    }
}

fn should_render_children(is_authenticated: bool, is_loading: bool) -> bool {
    is_authenticated && !is_loading
}

/// Backup management is admin-only; everyone else gets a notice, not a redirect loop.
#[component]
pub fn RequireAdmin(children: ChildrenFn) -> impl IntoView {
    let (auth, _) = use_auth();
    let is_authenticated = create_memo(move |_| auth.get().is_authenticated);
    let is_loading = create_memo(move |_| auth.get().loading);
    let is_admin = create_memo(move |_| is_admin_user(auth.get().user.as_ref()));
    create_effect(move |_| {
        let state = auth.get();
        if state.loading || state.is_authenticated {
            return;
        }
        redirect_to(ROUTE_LOGIN);
    });
    view! {
        <Show
            when=move || {
                should_render_admin_children(is_authenticated.get(), is_loading.get(), is_admin.get())
            }
            fallback=move || {
                if is_loading.get() {
                    view! { <LoadingSpinner /> }.into_view()
                } else if is_authenticated.get() {
                    view! {
                        <div class="p-6 text-fg-muted" role="alert">
                            "Administrator access is required to manage backups."
                        </div>
                    }
                    .into_view()
                } else {
                    ().into_view()
                }
            }
        >
            {children()}
        </Show>
    }
}

fn is_admin_user(user: Option<&UserResponse>) -> bool {
    user.map(UserResponse::is_admin).unwrap_or(false)
}

fn should_render_admin_children(is_authenticated: bool, is_loading: bool, is_admin: bool) -> bool {
    is_authenticated && is_admin && !is_loading
}
