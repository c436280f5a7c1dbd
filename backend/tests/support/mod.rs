#![allow(dead_code)]
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::{body::Body, http::Request, Router};
use chrono::Utc;
use ledgerdesk_backend::{
    config::{BackupConfig, Config},
    error::AppError,
    models::user::{User, UserRole},
    repositories::UserRepository,
    routes::build_router,
    services::DatabaseDumper,
    state::AppState,
    utils::{jwt::create_access_token, password::hash_password},
};
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret-32-chars-minimum!";
pub const TEST_PASSWORD: &str = "correct horse battery staple";

/// Dumper double that writes a small SQL file and records every call.
#[derive(Default)]
pub struct FakeDumper {
    pub dumps: AtomicUsize,
    pub restores: Mutex<Vec<PathBuf>>,
    pub fail_dump: AtomicBool,
    pub fail_restore: AtomicBool,
    pub restore_delay: Mutex<Option<Duration>>,
}

impl FakeDumper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn dump_calls(&self) -> usize {
        self.dumps.load(Ordering::SeqCst)
    }

    pub fn restore_calls(&self) -> Vec<PathBuf> {
        self.restores.lock().expect("lock restores").clone()
    }

    pub fn set_restore_delay(&self, delay: Duration) {
        *self.restore_delay.lock().expect("lock delay") = Some(delay);
    }
}

#[async_trait]
impl DatabaseDumper for FakeDumper {
    async fn dump(&self, destination: &Path) -> anyhow::Result<()> {
        self.dumps.fetch_add(1, Ordering::SeqCst);
        if self.fail_dump.load(Ordering::SeqCst) {
            anyhow::bail!("pg_dump: connection refused");
        }
        tokio::fs::write(destination, b"-- fake dump\nSELECT 1;\n").await?;
        Ok(())
    }

    async fn restore(&self, source: &Path) -> anyhow::Result<()> {
        self.restores
            .lock()
            .expect("lock restores")
            .push(source.to_path_buf());
        let delay = *self.restore_delay.lock().expect("lock delay");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_restore.load(Ordering::SeqCst) {
            anyhow::bail!("psql: ERROR: relation \"orders\" does not exist");
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<Vec<User>>,
}

impl InMemoryUserRepository {
    pub fn insert(&self, user: User) {
        self.users.lock().expect("lock users").push(user);
    }

    pub fn remove(&self, id: &str) {
        self.users.lock().expect("lock users").retain(|u| u.id != id);
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        let users = self.users.lock().expect("lock users");
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let users = self.users.lock().expect("lock users");
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn upsert_admin(&self, username: &str, password_hash: &str) -> Result<User, AppError> {
        let user = make_user(username, password_hash, UserRole::Admin);
        let mut users = self.users.lock().expect("lock users");
        users.retain(|u| u.username != username);
        users.push(user.clone());
        Ok(user)
    }
}

pub fn make_user(username: &str, password_hash: &str, role: UserRole) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4().to_string(),
        username: username.to_string(),
        password_hash: password_hash.to_string(),
        full_name: format!("{} user", username),
        role,
        created_at: now,
        updated_at: now,
    }
}

pub fn test_config(backup_dir: &Path) -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        jwt_secret: TEST_JWT_SECRET.to_string(),
        jwt_expiration_hours: 1,
        bind_addr: "127.0.0.1:0".to_string(),
        backup: BackupConfig {
            dir: backup_dir.to_path_buf(),
            command_timeout_secs: 5,
            ..BackupConfig::default()
        },
        admin_username: None,
        admin_password: None,
    }
}

pub struct TestApp {
    pub state: AppState,
    pub users: Arc<InMemoryUserRepository>,
    pub dumper: Arc<FakeDumper>,
    pub dir: tempfile::TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create backup dir");
        let users = Arc::new(InMemoryUserRepository::default());
        let dumper = FakeDumper::new();
        let state = AppState::new(test_config(dir.path()), users.clone(), dumper.clone());
        Self {
            state,
            users,
            dumper,
            dir,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub fn seed_user(&self, username: &str, role: UserRole) -> User {
        let hash = hash_password(TEST_PASSWORD).expect("hash password");
        let user = make_user(username, &hash, role);
        self.users.insert(user.clone());
        user
    }
}

pub fn create_test_token(user: &User) -> String {
    let (token, _) = create_access_token(
        user.id.clone(),
        user.username.clone(),
        user.role.as_str().to_string(),
        TEST_JWT_SECRET,
        1,
    )
    .expect("create token");
    token
}

pub fn authed(
    method: &str,
    uri: &str,
    token: &str,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token));
    match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .expect("build request"),
        None => builder.body(Body::empty()).expect("build request"),
    }
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body")
        .to_vec()
}
