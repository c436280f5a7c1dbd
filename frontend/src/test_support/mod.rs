#[cfg(all(test, not(target_arch = "wasm32")))]
pub mod ssr;

#[cfg(test)]
pub mod helpers {
    use crate::api::UserResponse;
    use crate::state::auth::AuthState;
    use leptos::*;

    pub fn admin_user() -> UserResponse {
        UserResponse {
            id: "u-admin".into(),
            username: "admin".into(),
            full_name: "Admin User".into(),
            role: "admin".into(),
        }
    }

    pub fn staff_user() -> UserResponse {
        UserResponse {
            id: "u-staff".into(),
            username: "staff".into(),
            full_name: "Staff User".into(),
            role: "staff".into(),
        }
    }

    pub fn provide_auth(
        user: Option<UserResponse>,
        loading: bool,
    ) -> (ReadSignal<AuthState>, WriteSignal<AuthState>) {
        let (auth, set_auth) = create_signal(AuthState {
            is_authenticated: user.is_some(),
            user,
            loading,
        });
        provide_context((auth, set_auth));
        (auth, set_auth)
    }
}
