//! # Reference Data Handlers
//!
//! Pharmacies, medicine types and classification criteria. Any signed-in
//! user may read them; only admins change them.

use super::{ack, wrap_response, ApiResponse, AppError, AppState};
use crate::{
    auth::middleware::{AdminUser, AuthenticatedUser},
    types::Ack,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use medreturn::reference::{
    self, Criterion, CriterionInput, MedicineType, MedicineTypeInput, Pharmacy, PharmacyInput,
};
use serde::{Deserialize, Serialize};

type Created<T> = (StatusCode, Json<ApiResponse<T>>);

// --- Pharmacies ---

pub async fn list_pharmacies_handler(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<ApiResponse<Vec<Pharmacy>>>, AppError> {
    let conn = app_state.store.read().await?;
    Ok(wrap_response(reference::list_pharmacies(&conn).await?))
}

pub async fn get_pharmacy_handler(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Pharmacy>>, AppError> {
    let conn = app_state.store.read().await?;
    Ok(wrap_response(reference::get_pharmacy(&conn, &id).await?))
}

pub async fn create_pharmacy_handler(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Json(payload): Json<PharmacyInput>,
) -> Result<Created<Pharmacy>, AppError> {
    let tx = app_state.store.write().await?;
    let created = reference::create_pharmacy(&tx, payload).await;
    Ok((StatusCode::CREATED, wrap_response(tx.settle(created).await?)))
}

pub async fn update_pharmacy_handler(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(payload): Json<PharmacyInput>,
) -> Result<Json<ApiResponse<Pharmacy>>, AppError> {
    let tx = app_state.store.write().await?;
    let updated = reference::update_pharmacy(&tx, &id, payload).await;
    Ok(wrap_response(tx.settle(updated).await?))
}

pub async fn delete_pharmacy_handler(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Ack>>, AppError> {
    let tx = app_state.store.write().await?;
    let deleted = reference::delete_pharmacy(&tx, &id).await;
    tx.settle(deleted).await?;
    Ok(ack())
}

// --- Medicine types ---

pub async fn list_medicine_types_handler(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<ApiResponse<Vec<MedicineType>>>, AppError> {
    let conn = app_state.store.read().await?;
    Ok(wrap_response(reference::list_medicine_types(&conn).await?))
}

pub async fn get_medicine_type_handler(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<MedicineType>>, AppError> {
    let conn = app_state.store.read().await?;
    Ok(wrap_response(reference::get_medicine_type(&conn, &id).await?))
}

pub async fn create_medicine_type_handler(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Json(payload): Json<MedicineTypeInput>,
) -> Result<Created<MedicineType>, AppError> {
    let tx = app_state.store.write().await?;
    let created = reference::create_medicine_type(&tx, payload).await;
    Ok((StatusCode::CREATED, wrap_response(tx.settle(created).await?)))
}

pub async fn update_medicine_type_handler(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(payload): Json<MedicineTypeInput>,
) -> Result<Json<ApiResponse<MedicineType>>, AppError> {
    let tx = app_state.store.write().await?;
    let updated = reference::update_medicine_type(&tx, &id, payload).await;
    Ok(wrap_response(tx.settle(updated).await?))
}

pub async fn delete_medicine_type_handler(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Ack>>, AppError> {
    let tx = app_state.store.write().await?;
    let deleted = reference::delete_medicine_type(&tx, &id).await;
    tx.settle(deleted).await?;
    Ok(ack())
}

// --- Criteria ---

#[derive(Debug, Deserialize, Default)]
pub struct CriteriaQuery {
    #[serde(default)]
    pub active_only: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CriterionRemoval {
    /// `false` when the criterion was only deactivated because results use it.
    pub removed: bool,
}

pub async fn list_criteria_handler(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<CriteriaQuery>,
) -> Result<Json<ApiResponse<Vec<Criterion>>>, AppError> {
    let conn = app_state.store.read().await?;
    let active_only = query.active_only.unwrap_or(false);
    Ok(wrap_response(
        reference::list_criteria(&conn, active_only).await?,
    ))
}

pub async fn get_criterion_handler(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Criterion>>, AppError> {
    let conn = app_state.store.read().await?;
    Ok(wrap_response(reference::get_criterion(&conn, &id).await?))
}

pub async fn create_criterion_handler(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Json(payload): Json<CriterionInput>,
) -> Result<Created<Criterion>, AppError> {
    let tx = app_state.store.write().await?;
    let created = reference::create_criterion(&tx, payload).await;
    Ok((StatusCode::CREATED, wrap_response(tx.settle(created).await?)))
}

pub async fn update_criterion_handler(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(payload): Json<CriterionInput>,
) -> Result<Json<ApiResponse<Criterion>>, AppError> {
    let tx = app_state.store.write().await?;
    let updated = reference::update_criterion(&tx, &id, payload).await;
    Ok(wrap_response(tx.settle(updated).await?))
}

pub async fn delete_criterion_handler(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<CriterionRemoval>>, AppError> {
    let tx = app_state.store.write().await?;
    let deleted = reference::delete_criterion(&tx, &id).await;
    let removed = tx.settle(deleted).await?;
    Ok(wrap_response(CriterionRemoval { removed }))
}
