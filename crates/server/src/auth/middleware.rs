//! # Authentication Middleware
//!
//! Axum extractors that resolve the caller to a [`User`]:
//!
//! 1.  **Bearer token**: `Authorization: Bearer <jwt>` carrying an access token.
//! 2.  **Legacy session**: `X-User-Id` + `X-Session-Token`, checked against
//!     `user_sessions` (active, unexpired, owned by that user).
//! 3.  **Neither**: the request is rejected with `401 Unauthorized`.
//!
//! [`AdminUser`] and [`ReviewerUser`] additionally require a minimum role rank.
//! [`MaybeUser`] never rejects bad credentials; public pages use it to add
//! per-user figures when the caller happens to be signed in.

use crate::{
    auth::tokens::{decode_token, TokenType},
    errors::AppError,
    state::AppState,
};
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use core_access::{Role, User};
use tracing::{debug, warn};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const SESSION_TOKEN_HEADER: &str = "x-session-token";

/// An Axum extractor that provides the currently authenticated user.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// An authenticated user with the `ADMIN` role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

/// An authenticated user who may review submissions (`ADMIN` or `CONGTACVIEN`).
#[derive(Debug, Clone)]
pub struct ReviewerUser(pub User);

/// The caller if their credentials check out, otherwise `None`.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// The legacy session pair, when both headers are present.
pub fn session_headers(parts: &Parts) -> Option<(String, String)> {
    Some((
        header(parts, USER_ID_HEADER)?.to_string(),
        header(parts, SESSION_TOKEN_HEADER)?.to_string(),
    ))
}

async fn user_from_bearer(state: &AppState, token: &str) -> Result<User, AppError> {
    let claims = decode_token(&state.config.jwt.secret, token, TokenType::Access)?;
    let conn = state.store.read().await?;
    core_access::find_user_by_id(&conn, &claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found.".to_string()))
}

async fn user_from_session(state: &AppState, user_id: &str, token: &str) -> Result<User, AppError> {
    // Validation touches `last_activity`, so it runs as a write.
    let tx = state.store.write().await?;
    let found = core_access::validate_session(&tx, user_id, token)
        .await
        .map_err(Into::into);
    tx.settle(found)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired session.".to_string()))
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let bearer_header =
            Option::<TypedHeader<Authorization<Bearer>>>::from_request_parts(parts, state)
                .await
                .map_err(|e| {
                    warn!("Unexpected error during header extraction: {}", e);
                    AppError::BadRequest("Invalid Authorization header format.".to_string())
                })?;

        let user = if let Some(TypedHeader(Authorization(bearer))) = bearer_header {
            user_from_bearer(state, bearer.token()).await?
        } else if let Some((user_id, token)) = session_headers(parts) {
            debug!(%user_id, "Authenticating with legacy session headers");
            user_from_session(state, &user_id, &token).await?
        } else {
            return Err(AppError::Unauthorized(
                "Authorization header missing.".to_string(),
            ));
        };

        Ok(AuthenticatedUser(user))
    }
}

fn require(user: User, role: Role) -> Result<User, AppError> {
    if user.has_rank(role) {
        Ok(user)
    } else {
        warn!(user_id = %user.id, role = %user.role, required = %role, "Insufficient role");
        Err(AppError::Forbidden(
            "Bạn không có quyền thực hiện thao tác này".to_string(),
        ))
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(user) = AuthenticatedUser::from_request_parts(parts, state).await?;
        require(user, Role::Admin).map(AdminUser)
    }
}

impl FromRequestParts<AppState> for ReviewerUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(user) = AuthenticatedUser::from_request_parts(parts, state).await?;
        require(user, Role::Collaborator).map(ReviewerUser)
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match AuthenticatedUser::from_request_parts(parts, state).await {
            Ok(AuthenticatedUser(user)) => Ok(MaybeUser(Some(user))),
            Err(AppError::Unauthorized(reason) | AppError::BadRequest(reason)) => {
                debug!(%reason, "Serving anonymous view");
                Ok(MaybeUser(None))
            }
            Err(e) => Err(e),
        }
    }
}
