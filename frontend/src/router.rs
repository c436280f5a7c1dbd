use leptos::*;
use leptos_meta::*;
use leptos_router::*;

use crate::{
    api::ApiClient,
    components::guard::RequireAdmin,
    pages::{BackupsPage, LoginPage},
    state::auth::AuthProvider,
};

pub const ROUTE_HOME: &str = "/";
pub const ROUTE_LOGIN: &str = "/login";
pub const ROUTE_BACKUPS: &str = "/backups";

pub const ROUTE_PATHS: &[&str] = &[ROUTE_HOME, ROUTE_LOGIN, ROUTE_BACKUPS];

pub const PROTECTED_ROUTE_PATHS: &[&str] = &[ROUTE_BACKUPS];

pub const PUBLIC_ROUTE_PATHS: &[&str] = &[ROUTE_HOME, ROUTE_LOGIN];

pub fn mount_app() {
    mount_to_body(app_root);
}

/// The client goes into context before `AuthProvider` so the tab-close
/// check and token verification share one session guard.
pub fn app_root() -> impl IntoView {
    provide_meta_context();
    provide_context(ApiClient::new());
    view! {
        <Title text="Ledgerdesk"/>
        <AuthProvider>
            <Router>
                <Routes>
                    <Route path=ROUTE_HOME view=HomeRedirect/>
                    <Route path=ROUTE_LOGIN view=LoginPage/>
                    <Route path=ROUTE_BACKUPS view=ProtectedBackups/>
                </Routes>
            </Router>
        </AuthProvider>
    }
}

#[component]
fn HomeRedirect() -> impl IntoView {
    view! { <Redirect path=ROUTE_BACKUPS/> }
}

#[component]
fn ProtectedBackups() -> impl IntoView {
    view! { <RequireAdmin><BackupsPage/></RequireAdmin> }
}
