//! One-shot retention pass for hosts that schedule pruning externally
//! (cron, systemd timers) instead of running the in-process scheduler.

use std::sync::Arc;

use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ledgerdesk_backend::{
    config::Config,
    services::{BackupService, PgDumpDumper},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "backup_prune=info,ledgerdesk_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    let dumper = Arc::new(PgDumpDumper::new(
        config.database_url.clone(),
        config.backup.pg_dump_path.clone(),
        config.backup.psql_path.clone(),
    ));
    let service = BackupService::new(
        config.backup.dir.clone(),
        dumper,
        config.backup.command_timeout(),
    );

    let removed = service
        .prune_expired(config.backup.retention_days, Utc::now())
        .await?;
    tracing::info!(
        count = removed.len(),
        retention_days = config.backup.retention_days,
        "Backup retention pass finished"
    );
    for filename in removed {
        println!("{}", filename);
    }
    Ok(())
}
