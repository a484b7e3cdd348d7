//! # Application State
//!
//! This module defines the shared application state (`AppState`) and the logic
//! for building it at startup. The `AppState` holds all shared resources: the
//! configuration, the store, the chatbot client and the registry of open chat
//! sockets.

use crate::{config::AppConfig, ws::registry::ConnectionRegistry};
use medreturn::{ChatbotProvider, LangGraphChatbot, Store};
use std::{sync::Arc, time::Duration};

/// The shared application state, accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration, loaded from `config.yml`.
    pub config: Arc<AppConfig>,
    /// The one store every handler reads from and writes through.
    pub store: Store,
    /// The external chatbot. Swapped for a mock in tests.
    pub chatbot: Arc<dyn ChatbotProvider>,
    /// Open WebSocket connections, keyed by user id.
    pub connections: Arc<ConnectionRegistry>,
}

impl AppState {
    /// Assembles a state from parts that are already built.
    pub fn new(config: AppConfig, store: Store, chatbot: Arc<dyn ChatbotProvider>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            chatbot,
            connections: Arc::new(ConnectionRegistry::new()),
        }
    }
}

/// Builds the shared application state from the configuration.
///
/// This opens the database, makes sure the schema exists and creates the
/// chatbot client with its request timeout.
pub async fn build_app_state(config: AppConfig) -> anyhow::Result<AppState> {
    if let Some(parent) = std::path::Path::new(&config.db_url).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let store = Store::open(&config.db_url, config.max_connections).await?;
    tracing::info!(db_path = %config.db_url, "Initialized store.");
    // Ensure the database schema is up-to-date on startup.
    store.initialize_schema().await?;

    let chatbot = LangGraphChatbot::new(
        config.chatbot.api_url.clone(),
        Duration::from_secs(config.chatbot.timeout_secs),
    )?;
    tracing::info!(api_url = %chatbot.endpoint(), "Initialized chatbot client.");

    Ok(AppState::new(config, store, Arc::new(chatbot)))
}
