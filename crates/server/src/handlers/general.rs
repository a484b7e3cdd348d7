//! # General Route Handlers
//!
//! Endpoints that need no authentication: liveness checks and the public
//! dashboard.

use super::{wrap_response, AppError, AppState};
use crate::{auth::middleware::MaybeUser, types::ApiResponse};
use axum::{extract::State, Json};
use chrono::Utc;
use medreturn::stats::{self, PublicDashboard};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub struct PingResponse {
    pub service: String,
    pub version: String,
}

/// The handler for the root (`/`) endpoint.
pub async fn root() -> &'static str {
    "medreturn server is running."
}

/// The handler for the health check (`/health`) endpoint.
pub async fn health_check() -> &'static str {
    "OK"
}

pub async fn ping_handler() -> Json<ApiResponse<PingResponse>> {
    wrap_response(PingResponse {
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Landing-page figures. A valid token adds the caller's own progress; a
/// missing or stale one just leaves `user_stats` empty.
pub async fn dashboard_metrics_handler(
    State(app_state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
) -> Result<Json<ApiResponse<PublicDashboard>>, AppError> {
    let conn = app_state.store.read().await?;
    let today = Utc::now().date_naive();
    let dashboard = stats::public_dashboard(&conn, viewer.as_ref(), today).await?;
    Ok(wrap_response(dashboard))
}
