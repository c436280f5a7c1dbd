use super::utils::LoginFormState;
use crate::api::{ApiError, LoginRequest};
use crate::router::ROUTE_BACKUPS;
use crate::state::auth;
use leptos::*;

#[derive(Clone, Copy)]
pub struct LoginViewModel {
    pub form: LoginFormState,
    pub error: RwSignal<Option<ApiError>>,
    pub login_action: Action<LoginRequest, Result<(), ApiError>>,
}

impl LoginViewModel {
    pub fn submit(&self) {
        if self.login_action.pending().get_untracked() {
            return;
        }
        match self.form.to_request() {
            Ok(request) => {
                self.error.set(None);
                self.login_action.dispatch(request);
            }
            Err(err) => self.error.set(Some(err)),
        }
    }
}

pub fn use_login_view_model() -> LoginViewModel {
    let form = LoginFormState::default();
    let error = create_rw_signal(None::<ApiError>);
    let login_action = auth::use_login_action();

    create_effect(move |_| {
        if let Some(result) = login_action.value().get() {
            match result {
                Ok(()) => {
                    error.set(None);
                    form.clear_password();
                    if let Some(window) = web_sys::window() {
                        if let Err(err) = window.location().set_href(ROUTE_BACKUPS) {
                            log::warn!("Redirect after login failed: {:?}", err);
                        }
                    }
                }
                Err(err) => {
                    form.clear_password();
                    error.set(Some(err));
                }
            }
        }
    });

    LoginViewModel {
        form,
        error,
        login_action,
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod host_tests {
    use super::*;
    use crate::test_support::ssr::with_runtime;

    #[test]
    fn login_view_model_defaults_empty() {
        with_runtime(|| {
            let vm = use_login_view_model();
            assert!(vm.error.get().is_none());
            assert!(vm.form.username.get().is_empty());
        });
    }

    #[test]
    fn submit_with_blank_fields_sets_error_without_dispatch() {
        with_runtime(|| {
            let vm = use_login_view_model();
            vm.submit();
            assert_eq!(
                vm.error.get().map(|e| e.code),
                Some("VALIDATION_ERROR".to_string())
            );
            assert_eq!(vm.login_action.version().get(), 0);
        });
    }
}
