//! # Chat Relay
//!
//! `GET /api/ws/chat?token=<jwt>` upgrades to a WebSocket. After the token
//! checks out, the socket is registered in the [`registry::ConnectionRegistry`]
//! and served by two halves: a writer task draining the socket's outbox, and
//! a reader loop handing each client frame to [`relay::dispatch`].

pub mod registry;
pub mod relay;

use crate::{
    auth::tokens::{self, TokenType},
    state::AppState,
};
use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use core_access::User;
use futures::{SinkExt, StreamExt};
use medreturn::chat::{Message, MessageView};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Frames a client may send.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    ChatMessage {
        #[serde(default)]
        content: String,
        #[serde(default)]
        recipient_id: Option<String>,
    },
    ChatbotMessage {
        #[serde(default)]
        content: String,
    },
    Typing {
        #[serde(default)]
        recipient_id: Option<String>,
    },
    MarkRead {
        #[serde(default)]
        message_ids: Vec<String>,
    },
}

/// One side of a chatbot exchange as pushed to the client.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatbotTurn {
    pub id: String,
    pub sender_id: String,
    pub content: String,
    pub message_type: String,
    pub created_at: String,
    #[serde(rename = "isBot")]
    pub is_bot: bool,
}

impl From<&Message> for ChatbotTurn {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.clone(),
            sender_id: message.sender_id.clone(),
            content: message.text().to_string(),
            message_type: message.kind.clone(),
            created_at: message.created_at.clone(),
            is_bot: message.is_bot(),
        }
    }
}

/// Frames the server pushes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Connected {
        message: String,
        user_id: String,
    },
    NewMessage {
        message: MessageView,
    },
    MessageSent {
        message: MessageView,
    },
    ChatbotResponse {
        user_message: ChatbotTurn,
        bot_message: ChatbotTurn,
    },
    Typing {
        user_id: String,
        user_name: String,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Deserialize)]
pub struct SocketParams {
    pub token: Option<String>,
}

/// Upgrades the request; authentication happens on the open socket so a
/// failure can be reported with close code 1008.
pub async fn chat_socket_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
    Query(params): Query<SocketParams>,
) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, app_state, params.token))
}

async fn authenticate_socket(app_state: &AppState, token: Option<&str>) -> Result<User, String> {
    let token = token.ok_or_else(|| "Missing token".to_string())?;
    let claims = tokens::decode_token(&app_state.config.jwt.secret, token, TokenType::Access)
        .map_err(|_| "Invalid token".to_string())?;
    let conn = app_state
        .store
        .read()
        .await
        .map_err(|e| format!("Store unavailable: {e}"))?;
    core_access::find_user_by_id(&conn, &claims.sub)
        .await
        .map_err(|e| format!("Lookup failed: {e}"))?
        .ok_or_else(|| "User not found".to_string())
}

async fn serve_socket(mut socket: WebSocket, app_state: AppState, token: Option<String>) {
    let user = match authenticate_socket(&app_state, token.as_deref()).await {
        Ok(user) => user,
        Err(reason) => {
            warn!(%reason, "Rejected chat socket");
            let _ = socket
                .send(WsMessage::Close(Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: reason.into(),
                })))
                .await;
            return;
        }
    };

    let registry = app_state.connections.clone();
    let (connection_id, mut outbox) = registry.connect(&user.id);
    info!(user_id = %user.id, connection_id, "Chat socket connected");
    registry.send_to_connection(
        &user.id,
        connection_id,
        ServerFrame::Connected {
            message: "Connected to chat server".to_string(),
            user_id: user.id.clone(),
        },
    );

    let (mut sink, mut stream) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbox.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to encode frame: {e}");
                    continue;
                }
            };
            if sink.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(incoming) = stream.next().await {
        match incoming {
            Ok(WsMessage::Text(text)) => {
                relay::handle_text(&app_state, &user, connection_id, text.as_str()).await;
            }
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(user_id = %user.id, "Chat socket error: {e}");
                break;
            }
        }
    }

    registry.disconnect(&user.id, connection_id);
    writer.abort();
    info!(user_id = %user.id, connection_id, "Chat socket closed");
}
