use crate::{
    api::{ApiClient, ApiError, ApiErrorKind, LoginRequest, LoginResponse, UserResponse},
    state::session::SessionGuard,
};
use leptos::*;

type AuthContext = (ReadSignal<AuthState>, WriteSignal<AuthState>);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub user: Option<UserResponse>,
    pub is_authenticated: bool,
    pub loading: bool,
}

impl AuthState {
    fn signed_out() -> Self {
        Self::default()
    }
}

/// The client provided by the app root, or one backed by the browser.
pub fn use_api_client() -> ApiClient {
    use_context::<ApiClient>().unwrap_or_else(ApiClient::new)
}

fn create_auth_context() -> AuthContext {
    let (auth_state, set_auth_state) = create_signal(AuthState::default());
    let api_client = use_api_client();
    let session = api_client.session().clone();

    // The tab-close check must run before the stored token is trusted.
    let logout_session = session.clone();
    let listener = session.setup_tab_close_listener(move || {
        logout_session.clear_token();
        set_auth_state.set(AuthState::signed_out());
    });
    on_cleanup(move || drop(listener));

    if session.get_valid_token().is_none() {
        if session.has_stored_token() {
            log::info!("Discarding expired session token");
            session.clear_token();
        }
        return (auth_state, set_auth_state);
    }

    set_auth_state.update(|state| state.loading = true);
    spawn_local(async move {
        let result = api_client.verify().await;
        apply_verify_result(result, api_client.session(), set_auth_state);
    });

    (auth_state, set_auth_state)
}

#[component]
pub fn AuthProvider(children: Children) -> impl IntoView {
    let ctx = create_auth_context();
    provide_context::<AuthContext>(ctx);
    view! { <>{children()}</> }
}

pub fn use_auth() -> AuthContext {
    use_context::<AuthContext>().unwrap_or_else(|| create_signal(AuthState::default()))
}

fn apply_verify_result(
    result: Result<UserResponse, ApiError>,
    session: &SessionGuard,
    set_auth_state: WriteSignal<AuthState>,
) {
    match result {
        Ok(user) => set_auth_state.set(AuthState {
            user: Some(user),
            is_authenticated: true,
            loading: false,
        }),
        Err(err) => {
            if matches!(err.kind(), ApiErrorKind::AuthRequired) {
                session.clear_token();
            } else {
                log::warn!("Session check failed: {}", err);
            }
            set_auth_state.set(AuthState::signed_out());
        }
    }
}

/// Persists the token only for a successful login.
pub fn apply_login_result(
    result: Result<LoginResponse, ApiError>,
    session: &SessionGuard,
    set_auth_state: WriteSignal<AuthState>,
) -> Result<(), ApiError> {
    match result {
        Ok(response) => {
            session.store_token(&response.token);
            set_auth_state.set(AuthState {
                user: Some(response.user),
                is_authenticated: true,
                loading: false,
            });
            Ok(())
        }
        Err(error) => {
            set_auth_state.update(|state| state.loading = false);
            Err(error)
        }
    }
}

pub async fn login_request(
    request: LoginRequest,
    api: &ApiClient,
    set_auth_state: WriteSignal<AuthState>,
) -> Result<(), ApiError> {
    set_auth_state.update(|state| state.loading = true);
    let result = api.login(&request).await;
    if let Err(err) = &result {
        log::info!("Login failed: {}", err.code);
    }
    apply_login_result(result, api.session(), set_auth_state)
}

/// Tokens are stateless on the server, so logging out is purely local.
pub fn logout(session: &SessionGuard, set_auth_state: WriteSignal<AuthState>) {
    session.clear_token();
    set_auth_state.set(AuthState::signed_out());
}

pub fn use_login_action() -> Action<LoginRequest, Result<(), ApiError>> {
    let (_auth, set_auth) = use_auth();
    let api = use_api_client();

    create_action(move |request: &LoginRequest| {
        let payload = request.clone();
        let api = api.clone();
        async move { login_request(payload, &api, set_auth).await }
    })
}

pub fn use_logout() -> Callback<()> {
    let (_auth, set_auth) = use_auth();
    let api = use_api_client();
    Callback::new(move |_| logout(api.session(), set_auth))
}
