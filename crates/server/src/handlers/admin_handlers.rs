//! # Admin Route Handlers
//!
//! This module contains handlers for endpoints under `/api/admin` that require
//! the `ADMIN` role.

use super::{
    ack, notification_handlers::parse_kind, submission_handlers::parse_status, wrap_response,
    ApiResponse, AppError, AppState,
};
use crate::{auth::middleware::AdminUser, types::Ack};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use core_access::User;
use medreturn::{
    classification::{self, ClassificationEntry, ClassificationResult},
    collaborators::{self, CollaboratorDecision},
    notifications::{self, OutgoingNotification},
    points::{self, LedgerEntry},
    review::{self, ReviewOutcome, ReviewRequest},
    stats::{self, AdminStatistics},
    submissions::{self, SubmissionFilter, SubmissionView},
    types::{NotificationKind, Outcome},
    DomainError,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

const DEFAULT_LEDGER_LIMIT: i64 = 200;

// --- Submissions ---

#[derive(Debug, Deserialize, Default)]
pub struct AdminSubmissionQuery {
    #[serde(default)]
    pub status: Option<String>,
}

pub async fn admin_list_submissions_handler(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<AdminSubmissionQuery>,
) -> Result<Json<ApiResponse<Vec<SubmissionView>>>, AppError> {
    let filter = SubmissionFilter {
        status: parse_status(query.status.as_deref())?,
        ..SubmissionFilter::default()
    };
    let conn = app_state.store.read().await?;
    Ok(wrap_response(
        submissions::list_submissions(&conn, &filter).await?,
    ))
}

/// Approve, reject, return to the pharmacy, or recall a pending submission.
pub async fn submission_action_handler(
    State(app_state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(submission_id): Path<String>,
    Json(payload): Json<ReviewRequest>,
) -> Result<Json<ApiResponse<ReviewOutcome>>, AppError> {
    let outcome =
        review::apply_review_action(&app_state.store, &admin, &submission_id, &payload).await?;
    Ok(wrap_response(outcome))
}

// --- Classification results ---

#[derive(Debug, Deserialize)]
pub struct ClassificationCreate {
    #[serde(alias = "id_ho_so")]
    pub submission_id: String,
    #[serde(alias = "chi_tiet")]
    pub classifications: Vec<ClassificationEntry>,
    #[serde(alias = "ket_qua_tong", default)]
    pub overall: Option<String>,
    #[serde(alias = "ghi_chu", default)]
    pub notes: Option<String>,
}

fn parse_overall(raw: Option<&str>) -> Result<Option<Outcome>, AppError> {
    match raw {
        Some(raw) => Outcome::parse(raw)
            .map(Some)
            .ok_or_else(|| AppError::BadRequest(format!("Kết quả không hợp lệ: {raw}"))),
        None => Ok(None),
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ClassificationUpdate {
    #[serde(alias = "ket_qua_tong", default)]
    pub overall: Option<String>,
    #[serde(alias = "ghi_chu", default)]
    pub notes: Option<String>,
    #[serde(alias = "chi_tiet", default)]
    pub classifications: Option<Vec<ClassificationEntry>>,
}

pub async fn list_classification_results_handler(
    State(app_state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<ApiResponse<Vec<ClassificationResult>>>, AppError> {
    let conn = app_state.store.read().await?;
    Ok(wrap_response(classification::list_results(&conn).await?))
}

pub async fn create_classification_result_handler(
    State(app_state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<ClassificationCreate>,
) -> Result<(StatusCode, Json<ApiResponse<ClassificationResult>>), AppError> {
    let overall = parse_overall(payload.overall.as_deref())?;
    let result = review::classify_submission(
        &app_state.store,
        &admin,
        &payload.submission_id,
        &payload.classifications,
        overall,
        payload.notes.as_deref(),
    )
    .await?;
    Ok((StatusCode::CREATED, wrap_response(result)))
}

/// New details re-derive the aggregate unless one is given explicitly.
pub async fn update_classification_result_handler(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Path(result_id): Path<String>,
    Json(payload): Json<ClassificationUpdate>,
) -> Result<Json<ApiResponse<ClassificationResult>>, AppError> {
    let explicit = parse_overall(payload.overall.as_deref())?;

    let tx = app_state.store.write().await?;
    let updated: Result<ClassificationResult, DomainError> = async {
        let checked = match payload.classifications.as_deref() {
            Some(entries) => Some(classification::check_entries(&tx, entries).await?),
            None => None,
        };
        let overall = explicit.or_else(|| {
            checked.as_ref().map(|entries| {
                let outcomes: Vec<Outcome> = entries.iter().map(|e| e.outcome).collect();
                classification::aggregate_outcome(&outcomes)
            })
        });
        classification::update_result(
            &tx,
            &result_id,
            overall,
            payload.notes.as_deref(),
            checked.as_deref(),
        )
        .await
    }
    .await;
    Ok(wrap_response(tx.settle(updated).await?))
}

pub async fn delete_classification_result_handler(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Path(result_id): Path<String>,
) -> Result<Json<ApiResponse<Ack>>, AppError> {
    let tx = app_state.store.write().await?;
    let deleted: Result<(), DomainError> = async {
        classification::get_result(&tx, &result_id).await?;
        classification::delete_result(&tx, &result_id).await
    }
    .await;
    tx.settle(deleted).await?;
    Ok(ack())
}

// --- Notifications ---

#[derive(Debug, Deserialize)]
pub struct SystemNotificationRequest {
    #[serde(alias = "noi_dung")]
    pub body: String,
    #[serde(alias = "loai_thong_bao", default)]
    pub kind: Option<String>,
    /// Only these users; everyone when absent.
    #[serde(alias = "user_ids", default)]
    pub recipient_ids: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct UserNotificationRequest {
    #[serde(alias = "id_nguoi_nhan", alias = "user_id")]
    pub recipient_id: String,
    #[serde(alias = "noi_dung")]
    pub body: String,
    #[serde(alias = "loai_thong_bao", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BroadcastReport {
    pub sent: usize,
}

pub async fn system_notification_handler(
    State(app_state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<SystemNotificationRequest>,
) -> Result<Json<ApiResponse<BroadcastReport>>, AppError> {
    let kind = parse_kind(payload.kind.as_deref(), NotificationKind::System)?;
    let mut outgoing = OutgoingNotification::from_sender(admin.id.clone(), kind, payload.body);
    outgoing.metadata = payload.metadata;
    let sent = notifications::broadcast(
        &app_state.store,
        payload.recipient_ids.as_deref(),
        &outgoing,
    )
    .await?;
    info!(admin_id = %admin.id, sent, "Broadcast notification");
    Ok(wrap_response(BroadcastReport { sent }))
}

pub async fn user_notification_handler(
    State(app_state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<UserNotificationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Value>>), AppError> {
    let kind = parse_kind(payload.kind.as_deref(), NotificationKind::User)?;
    let mut outgoing = OutgoingNotification::from_sender(admin.id.clone(), kind, payload.body);
    outgoing.metadata = payload.metadata;
    let id =
        notifications::send_to_user(&app_state.store, &payload.recipient_id, &outgoing).await?;
    Ok((
        StatusCode::CREATED,
        wrap_response(serde_json::json!({ "id": id })),
    ))
}

// --- Collaborator requests ---

pub async fn list_collaborator_requests_handler(
    State(app_state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<ApiResponse<Vec<User>>>, AppError> {
    let conn = app_state.store.read().await?;
    Ok(wrap_response(
        core_access::list_collaborator_requests(&conn).await?,
    ))
}

pub async fn decide_collaborator_request_handler(
    State(app_state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path((user_id, action)): Path<(String, String)>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let decision = CollaboratorDecision::parse(&action)?;
    let user =
        collaborators::decide_collaborator_request(&app_state.store, &user_id, decision).await?;
    info!(admin_id = %admin.id, %user_id, ?decision, "Collaborator request decided");
    Ok(wrap_response(user))
}

// --- Statistics & points ---

pub async fn admin_statistics_handler(
    State(app_state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<ApiResponse<AdminStatistics>>, AppError> {
    let conn = app_state.store.read().await?;
    Ok(wrap_response(stats::admin_statistics(&conn).await?))
}

#[derive(Debug, Deserialize, Default)]
pub struct LedgerQuery {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// The points ledger, newest first; one user's history when `user_id` is given.
pub async fn admin_points_handler(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<LedgerQuery>,
) -> Result<Json<ApiResponse<Vec<LedgerEntry>>>, AppError> {
    let conn = app_state.store.read().await?;
    let entries = match query.user_id.as_deref() {
        Some(user_id) => points::ledger_for_user(&conn, user_id).await?,
        None => {
            let limit = query.limit.unwrap_or(DEFAULT_LEDGER_LIMIT).clamp(1, 1000);
            points::all_entries(&conn, limit).await?
        }
    };
    Ok(wrap_response(entries))
}
