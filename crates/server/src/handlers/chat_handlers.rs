//! # Chat Route Handlers
//!
//! REST counterparts of the WebSocket relay. Messages sent here are pushed to
//! any sockets the recipients have open.

use super::{ack, wrap_response, ApiResponse, AppError, AppState};
use crate::{auth::middleware::AuthenticatedUser, types::Ack, ws::relay};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use medreturn::chat::{self, ChatbotExchange, Conversation, MessageQuery, MessageView};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(alias = "noi_dung")]
    pub content: String,
    #[serde(alias = "id_nguoi_nhan", default)]
    pub recipient_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatbotRequestBody {
    #[serde(alias = "noi_dung", alias = "message")]
    pub content: String,
}

pub async fn list_messages_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<MessageQuery>,
) -> Result<Json<ApiResponse<Vec<MessageView>>>, AppError> {
    let conn = app_state.store.read().await?;
    Ok(wrap_response(
        chat::list_messages(&conn, &user.0, &query).await?,
    ))
}

pub async fn send_message_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<MessageView>>>), AppError> {
    let sent = chat::send_chat_message(
        &app_state.store,
        &user.0,
        &payload.content,
        payload.recipient_id.as_deref(),
    )
    .await?;
    relay::deliver_sent(&app_state, &user.0.id, &sent);
    Ok((StatusCode::CREATED, wrap_response(sent)))
}

pub async fn list_conversations_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<Vec<Conversation>>>, AppError> {
    let conn = app_state.store.read().await?;
    Ok(wrap_response(chat::list_conversations(&conn, &user.0).await?))
}

pub async fn chatbot_history_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<Vec<MessageView>>>, AppError> {
    let conn = app_state.store.read().await?;
    Ok(wrap_response(
        chat::chatbot_messages(&conn, &user.0.id).await?,
    ))
}

pub async fn chatbot_message_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<ChatbotRequestBody>,
) -> Result<Json<ApiResponse<ChatbotExchange>>, AppError> {
    let exchange = chat::chatbot_exchange(
        &app_state.store,
        app_state.chatbot.as_ref(),
        &user.0,
        &payload.content,
        app_state.config.chatbot.history_limit,
    )
    .await?;
    Ok(wrap_response(exchange))
}

pub async fn mark_message_read_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(message_id): Path<String>,
) -> Result<Json<ApiResponse<Ack>>, AppError> {
    let tx = app_state.store.write().await?;
    let marked = chat::mark_message_read(&tx, &user.0.id, &message_id).await;
    tx.settle(marked).await?;
    Ok(ack())
}
