//! # Authentication Route Handlers
//!
//! Registration, login, token refresh, logout, and the legacy session issue
//! endpoint used by older clients.

use super::{ack, wrap_response, ApiResponse, AppError, AppState};
use crate::{
    auth::{
        middleware::{session_headers, AuthenticatedUser},
        tokens::{decode_token, issue_pair, TokenPair, TokenType},
    },
    types::Ack,
};
use axum::{
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    Json,
};
use core_access::{NewUser, Session, User};
use medreturn::DomainError;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email or phone number.
    #[serde(alias = "email", alias = "so_dien_thoai", alias = "username")]
    pub login: String,
    #[serde(alias = "mat_khau")]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: User,
}

pub async fn register_handler(
    State(app_state): State<AppState>,
    Json(payload): Json<NewUser>,
) -> Result<(StatusCode, Json<ApiResponse<AuthResponse>>), AppError> {
    let tx = app_state.store.write().await?;
    let registered = core_access::register_user(&tx, payload)
        .await
        .map_err(DomainError::from);
    let user = tx.settle(registered).await?;

    let tokens = issue_pair(&app_state.config.jwt, &user.id)?;
    Ok((
        StatusCode::CREATED,
        wrap_response(AuthResponse { tokens, user }),
    ))
}

pub async fn login_handler(
    State(app_state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, AppError> {
    let user = {
        let conn = app_state.store.read().await?;
        core_access::verify_credentials(&conn, &payload.login, &payload.password).await?
    };
    info!(user_id = %user.id, "User logged in");

    let tokens = issue_pair(&app_state.config.jwt, &user.id)?;
    Ok(wrap_response(AuthResponse { tokens, user }))
}

/// Trades a refresh token for a fresh pair.
pub async fn refresh_handler(
    State(app_state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<TokenPair>>, AppError> {
    let claims = decode_token(
        &app_state.config.jwt.secret,
        &payload.refresh_token,
        TokenType::Refresh,
    )?;
    let conn = app_state.store.read().await?;
    if core_access::find_user_by_id(&conn, &claims.sub)
        .await?
        .is_none()
    {
        return Err(AppError::Unauthorized("User not found.".to_string()));
    }
    Ok(wrap_response(issue_pair(&app_state.config.jwt, &claims.sub)?))
}

/// Returns the details of the currently authenticated user.
pub async fn get_me_handler(user: AuthenticatedUser) -> Json<ApiResponse<User>> {
    wrap_response(user.0)
}

/// The legacy session headers of the request, if any. Never rejects.
pub struct LegacySession(pub Option<(String, String)>);

impl<S: Send + Sync> FromRequestParts<S> for LegacySession {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(LegacySession(session_headers(parts)))
    }
}

/// JWTs are stateless; a legacy session presented with the request is revoked.
pub async fn logout_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    LegacySession(session): LegacySession,
) -> Result<Json<ApiResponse<Ack>>, AppError> {
    if let Some((user_id, token)) = session.filter(|(id, _)| *id == user.0.id) {
        let tx = app_state.store.write().await?;
        let revoked = core_access::revoke_session(&tx, &user_id, &token)
            .await
            .map_err(DomainError::from);
        tx.settle(revoked).await?;
    }
    info!(user_id = %user.0.id, "User logged out");
    Ok(ack())
}

/// Issues a legacy `X-User-Id` + `X-Session-Token` session.
pub async fn create_session_handler(
    State(app_state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Session>>), AppError> {
    let tx = app_state.store.write().await?;
    let ttl = chrono::Duration::hours(app_state.config.session.ttl_hours);
    let issued: Result<Session, DomainError> = async {
        let user = core_access::verify_credentials(&tx, &payload.login, &payload.password).await?;
        Ok(core_access::create_session(&tx, &user.id, ttl).await?)
    }
    .await;
    let session = tx.settle(issued).await?;
    Ok((StatusCode::CREATED, wrap_response(session)))
}
