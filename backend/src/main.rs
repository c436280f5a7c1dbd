use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ledgerdesk_backend::{
    config::Config,
    db::connection::create_pool,
    repositories::{PgUserRepository, UserRepository},
    routes::build_router,
    services::PgDumpDumper,
    state::AppState,
    utils::password::hash_password,
};

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    let prefix = s.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, s.len())
}

fn mask_database_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}***{}", &url[..scheme_end + 3], &url[at..])
        }
        _ => url.to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ledgerdesk_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(
        database_url = %mask_database_url(&config.database_url),
        jwt_secret = %mask_secret(&config.jwt_secret),
        jwt_expiration_hours = config.jwt_expiration_hours,
        backup_dir = %config.backup.dir.display(),
        auto_backup_enabled = config.backup.auto_enabled,
        retention_days = config.backup.retention_days,
        "Loaded configuration from environment/.env"
    );

    let pool = create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let users = Arc::new(PgUserRepository::new(pool.clone()));
    if let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) {
        let hash = hash_password(password)?;
        users.upsert_admin(username, &hash).await.map_err(|err| {
            anyhow::anyhow!("Failed to provision admin account: {:?}", err)
        })?;
        tracing::info!(username = %username, "Provisioned admin account");
    }

    let dumper = Arc::new(PgDumpDumper::new(
        config.database_url.clone(),
        config.backup.pg_dump_path.clone(),
        config.backup.psql_path.clone(),
    ));
    let state = AppState::new(config.clone(), users, dumper);

    let cancel = CancellationToken::new();
    let scheduler = state.scheduler.clone().spawn(cancel.clone());

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel.cancel();
    if let Some(handle) = scheduler {
        let _ = handle.await;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install shutdown handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
