//! # API Route Handlers
//!
//! This module organizes all the Axum route handlers for `medreturn-server`.
//! The handlers are split into sub-modules by the resource they serve.

pub mod admin_handlers;
pub mod auth_handlers;
pub mod chat_handlers;
pub mod general;
pub mod notification_handlers;
pub mod reference_handlers;
pub mod review_handlers;
pub mod submission_handlers;
pub mod user_handlers;
pub mod voucher_handlers;

// Re-export all handlers from the sub-modules to make them easily accessible
// to the router under a single `handlers::` path.
pub use admin_handlers::*;
pub use auth_handlers::*;
pub use chat_handlers::*;
pub use general::*;
pub use notification_handlers::*;
pub use reference_handlers::*;
pub use review_handlers::*;
pub use submission_handlers::*;
pub use user_handlers::*;
pub use voucher_handlers::*;

// Shared items used by multiple handler modules.
use super::{
    errors::AppError,
    state::AppState,
    types::{Ack, ApiResponse},
};
use axum::Json;

/// Wraps a successful result in the standard `ApiResponse` envelope.
pub(crate) fn wrap_response<T>(result: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        message: None,
        result,
    })
}

pub(crate) fn wrap_with_message<T>(result: T, message: impl Into<String>) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        message: Some(message.into()),
        result,
    })
}

pub(crate) fn ack() -> Json<ApiResponse<Ack>> {
    wrap_response(Ack { ok: true })
}
