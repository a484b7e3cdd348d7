//! # Submission Route Handlers
//!
//! Creating, listing, editing and deleting take-back submissions, plus the
//! reviewer's classify endpoint.

use super::{ack, wrap_response, ApiResponse, AppError, AppState};
use crate::{
    auth::middleware::{AuthenticatedUser, ReviewerUser},
    types::Ack,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use medreturn::{
    classification::{ClassificationEntry, ClassificationResult},
    review,
    submissions::{self, NewSubmission, Submission, SubmissionFilter, SubmissionPatch, SubmissionView},
    types::SubmissionStatus,
};
use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
pub struct SubmissionListQuery {
    /// Reviewers see every submission unless this is `1` or `true`.
    #[serde(default)]
    pub mine: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    #[serde(alias = "chi_tiet")]
    pub classifications: Vec<ClassificationEntry>,
    #[serde(alias = "ghi_chu", default)]
    pub notes: Option<String>,
}

pub(crate) fn parse_status(raw: Option<&str>) -> Result<Option<SubmissionStatus>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => SubmissionStatus::parse(value)
            .map(Some)
            .ok_or_else(|| AppError::BadRequest(format!("Trạng thái không hợp lệ: {value}"))),
        None => Ok(None),
    }
}

pub async fn list_submissions_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<SubmissionListQuery>,
) -> Result<Json<ApiResponse<Vec<SubmissionView>>>, AppError> {
    let mine = query
        .mine
        .as_deref()
        .is_some_and(|v| matches!(v.trim(), "1" | "true" | "yes"));
    let mut filter = SubmissionFilter::for_viewer(&user.0, mine);
    filter.status = parse_status(query.status.as_deref())?;
    let conn = app_state.store.read().await?;
    Ok(wrap_response(
        submissions::list_submissions(&conn, &filter).await?,
    ))
}

pub async fn create_submission_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<NewSubmission>,
) -> Result<(StatusCode, Json<ApiResponse<Submission>>), AppError> {
    let submission = submissions::create_submission(&app_state.store, &user.0, payload).await?;
    Ok((StatusCode::CREATED, wrap_response(submission)))
}

pub async fn update_submission_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(submission_id): Path<String>,
    Json(payload): Json<SubmissionPatch>,
) -> Result<Json<ApiResponse<Submission>>, AppError> {
    let tx = app_state.store.write().await?;
    let updated = submissions::update_submission(&tx, &user.0, &submission_id, payload).await;
    Ok(wrap_response(tx.settle(updated).await?))
}

pub async fn delete_submission_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(submission_id): Path<String>,
) -> Result<Json<ApiResponse<Ack>>, AppError> {
    let tx = app_state.store.write().await?;
    let deleted = submissions::delete_submission(&tx, &user.0, &submission_id).await;
    tx.settle(deleted).await?;
    Ok(ack())
}

/// Replaces the submission's classification with the given entries.
pub async fn classify_submission_handler(
    State(app_state): State<AppState>,
    ReviewerUser(reviewer): ReviewerUser,
    Path(submission_id): Path<String>,
    Json(payload): Json<ClassifyRequest>,
) -> Result<Json<ApiResponse<ClassificationResult>>, AppError> {
    let result = review::classify_submission(
        &app_state.store,
        &reviewer,
        &submission_id,
        &payload.classifications,
        None,
        payload.notes.as_deref(),
    )
    .await?;
    Ok(wrap_response(result))
}
