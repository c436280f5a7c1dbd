use crate::components::layout::Layout;
use leptos::*;

pub mod repository;
pub mod view_model;

mod panel;

pub use panel::BackupsPanel;

#[component]
pub fn BackupsPage() -> impl IntoView {
    view! {
        <Layout>
            <BackupsPanel />
        </Layout>
    }
}
