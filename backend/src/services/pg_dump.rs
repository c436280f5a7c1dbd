use std::{path::Path, process::Stdio};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use tokio::process::Command;

use super::backup::DatabaseDumper;

/// [`DatabaseDumper`] backed by the PostgreSQL client tools.
pub struct PgDumpDumper {
    database_url: String,
    pg_dump_path: String,
    psql_path: String,
}

impl PgDumpDumper {
    pub fn new(
        database_url: impl Into<String>,
        pg_dump_path: impl Into<String>,
        psql_path: impl Into<String>,
    ) -> Self {
        Self {
            database_url: database_url.into(),
            pg_dump_path: pg_dump_path.into(),
            psql_path: psql_path.into(),
        }
    }

    fn dump_command(&self, destination: &Path) -> Command {
        let mut cmd = Command::new(&self.pg_dump_path);
        cmd.arg("--dbname")
            .arg(&self.database_url)
            .arg("--clean")
            .arg("--if-exists")
            .arg("--no-owner")
            .arg("--no-privileges")
            .arg("--file")
            .arg(destination);
        cmd
    }

    fn restore_command(&self, source: &Path) -> Command {
        let mut cmd = Command::new(&self.psql_path);
        cmd.arg("--dbname")
            .arg(&self.database_url)
            .arg("--quiet")
            .arg("--set")
            .arg("ON_ERROR_STOP=1")
            .arg("--single-transaction")
            .arg("--file")
            .arg(source);
        cmd
    }
}

#[async_trait]
impl DatabaseDumper for PgDumpDumper {
    async fn dump(&self, destination: &Path) -> anyhow::Result<()> {
        let mut cmd = self.dump_command(destination);
        // A timed-out dump is dropped by the caller; take the child with it.
        cmd.kill_on_drop(true);
        run(cmd, &self.pg_dump_path).await
    }

    async fn restore(&self, source: &Path) -> anyhow::Result<()> {
        run(self.restore_command(source), &self.psql_path).await
    }
}

async fn run(mut cmd: Command, program: &str) -> anyhow::Result<()> {
    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .with_context(|| format!("failed to start {}", program))?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail = stderr.trim();
    Err(anyhow!(
        "{} exited with {}{}{}",
        program,
        output.status,
        if detail.is_empty() { "" } else { ": " },
        detail
    ))
}
