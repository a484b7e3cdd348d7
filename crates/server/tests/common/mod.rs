//! # Common Test Utilities
//!
//! This module centralizes the harness used across the `medreturn-server`
//! integration tests:
//!
//! - `TestApp`: spawns the real router on a random port with a temporary
//!   SQLite file and a temporary `config.yml`. The chatbot is either the real
//!   HTTP client pointed at an `httpmock::MockServer`, or a `MockChatbot`.
//! - Token helpers for minting access and refresh JWTs with the test secret.

// Not every test binary uses every helper.
#![allow(unused)]

use anyhow::Result;
use axum::serve;
use core_access::{Role, User};
use httpmock::MockServer;
use medreturn::Store;
use medreturn_server::{
    auth::tokens::{issue_token, TokenType},
    config::{self, AppConfig},
    router,
    state::{build_app_state, AppState},
};
use medreturn_test_utils::{MockChatbot, TestSetup};
use reqwest::Client;
use serde_json::Value;
use std::{fs::File, io::Write, net::SocketAddr, path::PathBuf, sync::Arc};
use tempfile::{tempdir, TempDir};
use tokio::{net::TcpListener, task::JoinHandle};

pub const TEST_JWT_SECRET: &str = "medreturn-test-secret";

// --- Full Application Test Harness ---

/// A harness for end-to-end testing of the Axum server.
pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub mock_server: MockServer,
    pub db_path: PathBuf,
    pub app_state: AppState,
    _config_dir: TempDir,
    _server_handle: JoinHandle<()>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

/// Writes a `config.yml` into `dir` and loads it through `get_config`.
fn write_config(dir: &TempDir, mock_server: &MockServer) -> Result<AppConfig> {
    let db_path = dir.path().join("medreturn.db");
    let config_path = dir.path().join("config.yml");
    let config_content = format!(
        r#"
port: 0
db_url: "{}"
max_connections: 4
jwt:
  secret: "{TEST_JWT_SECRET}"
session:
  ttl_hours: 24
chatbot:
  api_url: "{}"
  timeout_secs: 2
  history_limit: 10
"#,
        db_path.display(),
        mock_server.base_url()
    );
    let mut file = File::create(&config_path)?;
    file.write_all(config_content.as_bytes())?;

    let config_path = config_path.to_string_lossy().into_owned();
    Ok(config::get_config(Some(&config_path))?)
}

impl TestApp {
    /// Spawns the server with the real chatbot client aimed at `mock_server`.
    pub async fn spawn() -> Result<Self> {
        let mock_server = MockServer::start_async().await;
        let config_dir = tempdir()?;
        let config = write_config(&config_dir, &mock_server)?;
        let app_state = build_app_state(config).await?;
        Self::spawn_with_state(app_state, mock_server, config_dir).await
    }

    /// Spawns the server with a scripted chatbot instead of an HTTP one.
    pub async fn spawn_with_chatbot(chatbot: MockChatbot) -> Result<Self> {
        let mock_server = MockServer::start_async().await;
        let config_dir = tempdir()?;
        let config = write_config(&config_dir, &mock_server)?;
        let store = Store::open(&config.db_url, config.max_connections).await?;
        store.initialize_schema().await?;
        let app_state = AppState::new(config, store, Arc::new(chatbot));
        Self::spawn_with_state(app_state, mock_server, config_dir).await
    }

    async fn spawn_with_state(
        app_state: AppState,
        mock_server: MockServer,
        config_dir: TempDir,
    ) -> Result<Self> {
        dotenvy::dotenv().ok();
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .compact()
            .try_init();

        let db_path = PathBuf::from(&app_state.config.db_url);
        let app_state_for_harness = app_state.clone();

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr: SocketAddr = listener.local_addr()?;
        let address = format!("http://{addr}");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let server_handle = tokio::spawn(async move {
            let app = router::create_router(app_state);
            let server = serve(listener, app).with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            });
            if let Err(e) = server.await {
                tracing::error!("[TestApp] Server error: {}", e);
            }
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        Ok(Self {
            address,
            client: Client::new(),
            mock_server,
            db_path,
            app_state: app_state_for_harness,
            _config_dir: config_dir,
            _server_handle: server_handle,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Seeding helpers bound to the server's own store.
    pub fn setup(&self) -> TestSetup {
        TestSetup {
            store: self.app_state.store.clone(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Seeds a user with `role` and returns it with an access token.
    pub async fn user_with_token(&self, full_name: &str, role: Role) -> Result<(User, String)> {
        let user = self.setup().seed_user(full_name, role).await?;
        let token = access_token(&user.id)?;
        Ok((user, token))
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

// --- Token Helpers ---

/// A 30-minute access token for `user_id`, signed with the test secret.
pub fn access_token(user_id: &str) -> Result<String> {
    token_with_ttl(user_id, TokenType::Access, chrono::Duration::minutes(30))
}

pub fn refresh_token(user_id: &str) -> Result<String> {
    token_with_ttl(user_id, TokenType::Refresh, chrono::Duration::days(30))
}

pub fn token_with_ttl(
    user_id: &str,
    token_type: TokenType,
    ttl: chrono::Duration,
) -> Result<String> {
    issue_token(TEST_JWT_SECRET, user_id, token_type, ttl)
        .map_err(|e| anyhow::anyhow!("failed to issue test token: {e:?}"))
}

/// Pulls `result` out of an `ApiResponse` envelope.
pub async fn result_of(response: reqwest::Response) -> Result<Value> {
    let body: Value = response.json().await?;
    Ok(body["result"].clone())
}
