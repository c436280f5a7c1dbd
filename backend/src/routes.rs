use axum::{
    http::Method,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{handlers, middleware, state::AppState};

/// Assembles every route with its auth layer and the shared middleware stack.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/auth/login", post(handlers::auth::login));

    let user_routes = Router::new()
        .route("/api/auth/verify", get(handlers::auth::verify))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth,
        ));

    let admin_routes = Router::new()
        .route(
            "/api/backups",
            get(handlers::backups::list_backups).post(handlers::backups::create_backup),
        )
        .route(
            "/api/backups/auto-status",
            get(handlers::backups::auto_backup_status),
        )
        .route(
            "/api/backups/{filename}",
            axum::routing::delete(handlers::backups::delete_backup),
        )
        .route(
            "/api/backups/{filename}/download",
            get(handlers::backups::download_backup),
        )
        .route(
            "/api/backups/{filename}/restore",
            post(handlers::backups::restore_backup),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_admin,
        ));

    Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(admin_routes)
        .layer(
            ServiceBuilder::new()
                .layer(axum_middleware::from_fn(middleware::request_id))
                .layer(TraceLayer::new_for_http())
                .layer(axum_middleware::from_fn(middleware::log_error_responses))
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([
                            Method::GET,
                            Method::POST,
                            Method::DELETE,
                            Method::OPTIONS,
                        ])
                        .allow_headers(Any)
                        .max_age(std::time::Duration::from_secs(24 * 60 * 60)),
                ),
        )
        .with_state(state)
}
