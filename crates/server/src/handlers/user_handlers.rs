//! # User Route Handlers
//!
//! Profile changes for the caller, plus the admin-only account management
//! endpoints under `/api/users`.

use super::{ack, wrap_response, wrap_with_message, ApiResponse, AppError, AppState};
use crate::{
    auth::middleware::{AdminUser, AuthenticatedUser},
    types::Ack,
};
use axum::{
    extract::{Path, State},
    Json,
};
use core_access::{ProfileUpdate, User};
use medreturn::{
    accounts::{self, AdminUserUpdate},
    collaborators, DomainError,
};
use tracing::info;

pub async fn update_profile_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<ProfileUpdate>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let tx = app_state.store.write().await?;
    let updated = core_access::update_profile(&tx, &user.0.id, payload)
        .await
        .map_err(DomainError::from);
    Ok(wrap_response(tx.settle(updated).await?))
}

pub async fn collaborator_request_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<Ack>>, AppError> {
    collaborators::request_collaborator(&app_state.store, &user.0).await?;
    Ok(wrap_with_message(
        Ack { ok: true },
        "Đã gửi yêu cầu trở thành cộng tác viên",
    ))
}

/// Handler for retrieving a list of all users.
pub async fn list_users_handler(
    State(app_state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Result<Json<ApiResponse<Vec<User>>>, AppError> {
    info!(admin_id = %admin.id, "Listing all users");
    let conn = app_state.store.read().await?;
    Ok(wrap_response(core_access::list_users(&conn).await?))
}

/// Role change and/or point adjustment.
pub async fn admin_update_user_handler(
    State(app_state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<String>,
    Json(payload): Json<AdminUserUpdate>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let user = accounts::admin_update_user(&app_state.store, &admin, &user_id, &payload).await?;
    Ok(wrap_response(user))
}

pub async fn delete_user_handler(
    State(app_state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<Ack>>, AppError> {
    accounts::remove_user(&app_state.store, &admin, &user_id).await?;
    Ok(ack())
}
