//! # Notification Route Handlers
//!
//! The caller's inbox under `/api/notifications`.

use super::{ack, wrap_response, ApiResponse, AppError, AppState};
use crate::{auth::middleware::AuthenticatedUser, types::Ack};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use medreturn::{
    notifications::{self, Notification, OutgoingNotification},
    types::NotificationKind,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct Inbox {
    pub unread_count: i64,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationCreate {
    #[serde(alias = "id_nguoi_nhan")]
    pub recipient_id: String,
    #[serde(alias = "noi_dung")]
    pub body: String,
    #[serde(alias = "loai_thong_bao", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Cleared {
    pub count: u64,
}

pub(crate) fn parse_kind(raw: Option<&str>, fallback: NotificationKind) -> Result<NotificationKind, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => NotificationKind::parse(value)
            .ok_or_else(|| AppError::BadRequest(format!("Loại thông báo không hợp lệ: {value}"))),
        None => Ok(fallback),
    }
}

pub async fn list_notifications_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<Inbox>>, AppError> {
    let conn = app_state.store.read().await?;
    let notifications = notifications::list_for_recipient(&conn, &user.0.id).await?;
    let unread_count = notifications::unread_count(&conn, &user.0.id).await?;
    Ok(wrap_response(Inbox {
        unread_count,
        notifications,
    }))
}

/// Sends a notification from the caller to one user.
pub async fn create_notification_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<NotificationCreate>,
) -> Result<(StatusCode, Json<ApiResponse<Value>>), AppError> {
    let kind = parse_kind(payload.kind.as_deref(), NotificationKind::User)?;
    let mut outgoing = OutgoingNotification::from_sender(user.0.id.clone(), kind, payload.body);
    outgoing.metadata = payload.metadata;
    let id =
        notifications::send_to_user(&app_state.store, &payload.recipient_id, &outgoing).await?;
    Ok((
        StatusCode::CREATED,
        wrap_response(serde_json::json!({ "id": id })),
    ))
}

pub async fn mark_notification_read_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(notification_id): Path<String>,
) -> Result<Json<ApiResponse<Ack>>, AppError> {
    let tx = app_state.store.write().await?;
    let marked = notifications::mark_read(&tx, &user.0.id, &notification_id).await;
    tx.settle(marked).await?;
    Ok(ack())
}

pub async fn delete_notification_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(notification_id): Path<String>,
) -> Result<Json<ApiResponse<Ack>>, AppError> {
    let tx = app_state.store.write().await?;
    let deleted = notifications::delete(&tx, &user.0.id, &notification_id).await;
    tx.settle(deleted).await?;
    Ok(ack())
}

pub async fn mark_all_read_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<Cleared>>, AppError> {
    let tx = app_state.store.write().await?;
    let marked = notifications::mark_all_read(&tx, &user.0.id).await;
    let count = tx.settle(marked).await?;
    Ok(wrap_response(Cleared { count }))
}

/// Removes the caller's read notifications.
pub async fn clear_notifications_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<Cleared>>, AppError> {
    let tx = app_state.store.write().await?;
    let cleared = notifications::clear_read(&tx, &user.0.id).await;
    let count = tx.settle(cleared).await?;
    Ok(wrap_response(Cleared { count }))
}
