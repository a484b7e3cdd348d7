//! # Voucher Route Handlers
//!
//! The public catalogue and redemption under `/api/vouchers`, and catalogue
//! management under `/api/admin/vouchers`.

use super::{wrap_response, wrap_with_message, ApiResponse, AppError, AppState};
use crate::{
    auth::middleware::{AdminUser, AuthenticatedUser},
    types::StatusFilter,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use medreturn::{
    types::VoucherStatus,
    vouchers::{self, Deletion, Redemption, Voucher, VoucherInput, VoucherStat},
};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct DeletionResponse {
    pub outcome: Deletion,
}

/// Active vouchers, cheapest first.
pub async fn list_active_vouchers_handler(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<ApiResponse<Vec<Voucher>>>, AppError> {
    let conn = app_state.store.read().await?;
    Ok(wrap_response(vouchers::list_active(&conn).await?))
}

pub async fn voucher_stats_handler(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<ApiResponse<Vec<VoucherStat>>>, AppError> {
    let conn = app_state.store.read().await?;
    Ok(wrap_response(vouchers::voucher_stats(&conn).await?))
}

pub async fn redeem_voucher_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(voucher_id): Path<String>,
) -> Result<Json<ApiResponse<Redemption>>, AppError> {
    let redemption = vouchers::redeem_voucher(&app_state.store, &user.0.id, &voucher_id).await?;
    info!(user_id = %user.0.id, %voucher_id, "Voucher redeemed");
    Ok(wrap_with_message(redemption, "Đổi voucher thành công"))
}

pub async fn admin_list_vouchers_handler(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<ApiResponse<Vec<Voucher>>>, AppError> {
    let status = match filter.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            VoucherStatus::parse(raw)
                .ok_or_else(|| AppError::BadRequest(format!("Trạng thái không hợp lệ: {raw}")))?,
        ),
        None => None,
    };
    let conn = app_state.store.read().await?;
    Ok(wrap_response(vouchers::list_vouchers(&conn, status).await?))
}

pub async fn create_voucher_handler(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Json(payload): Json<VoucherInput>,
) -> Result<(StatusCode, Json<ApiResponse<Voucher>>), AppError> {
    let tx = app_state.store.write().await?;
    let created = vouchers::create_voucher(&tx, &payload).await;
    Ok((StatusCode::CREATED, wrap_response(tx.settle(created).await?)))
}

pub async fn update_voucher_handler(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Path(voucher_id): Path<String>,
    Json(payload): Json<VoucherInput>,
) -> Result<Json<ApiResponse<Voucher>>, AppError> {
    let tx = app_state.store.write().await?;
    let updated = vouchers::update_voucher(&tx, &voucher_id, &payload).await;
    Ok(wrap_response(tx.settle(updated).await?))
}

/// Vouchers with redemptions are deactivated; unused ones are removed.
pub async fn delete_voucher_handler(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Path(voucher_id): Path<String>,
) -> Result<Json<ApiResponse<DeletionResponse>>, AppError> {
    let tx = app_state.store.write().await?;
    let deleted = vouchers::delete_voucher(&tx, &voucher_id).await;
    let outcome = tx.settle(deleted).await?;
    Ok(wrap_response(DeletionResponse { outcome }))
}
