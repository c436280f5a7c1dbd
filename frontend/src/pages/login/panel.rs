use super::view_model::use_login_view_model;
use crate::components::error::InlineErrorMessage;
use leptos::{ev::SubmitEvent, *};

const INPUT_CLASS: &str = "appearance-none relative block w-full px-3 py-2 border border-border placeholder-fg-muted text-fg rounded-md focus:outline-none focus:z-10 sm:text-sm";

#[component]
pub fn LoginPanel() -> impl IntoView {
    let vm = use_login_view_model();
    let pending = vm.login_action.pending();
    let form = vm.form;

    let on_submit = move |ev: SubmitEvent| {
        ev.prevent_default();
        vm.submit();
    };

    view! {
        <div class="min-h-screen flex items-center justify-center bg-surface py-12 px-4 sm:px-6 lg:px-8">
            <div class="max-w-md w-full space-y-8">
                <div>
                    <h2 class="mt-6 text-center text-3xl font-extrabold text-fg">"Sign in to Ledgerdesk"</h2>
                    <p class="mt-2 text-center text-sm text-fg-muted">"Administration console"</p>
                </div>
                <form class="mt-8 space-y-4" on:submit=on_submit>
                    <div>
                        <label for="username" class="sr-only">"Username"</label>
                        <input
                            id="username"
                            name="username"
                            type="text"
                            autocomplete="username"
                            class=INPUT_CLASS
                            placeholder="Username"
                            prop:value=move || form.username.get()
                            on:input=move |ev| form.username.set(event_target_value(&ev))
                        />
                    </div>
                    <div>
                        <label for="password" class="sr-only">"Password"</label>
                        <input
                            id="password"
                            name="password"
                            type="password"
                            autocomplete="current-password"
                            class=INPUT_CLASS
                            placeholder="Password"
                            prop:value=move || form.password.get()
                            on:input=move |ev| form.password.set(event_target_value(&ev))
                        />
                    </div>

                    <InlineErrorMessage error=vm.error.into() />

                    <button
                        type="submit"
                        disabled=move || pending.get()
                        class="w-full flex justify-center py-2 px-4 text-sm font-medium rounded-md bg-action-primary-bg text-action-primary-text hover:bg-action-primary-bg-hover disabled:opacity-50"
                    >
                        {move || if pending.get() { "Signing in..." } else { "Sign in" }}
                    </button>
                </form>
            </div>
        </div>
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod host_tests {
    use super::LoginPanel;
    use crate::test_support::ssr::render_to_string;
    use leptos::*;

    #[test]
    fn login_panel_renders_form() {
        let html = render_to_string(|| view! { <LoginPanel /> });
        assert!(html.contains("Sign in to Ledgerdesk"));
        assert!(html.contains("type=\"password\""));
        assert!(!html.contains("role=\"alert\""));
    }
}
