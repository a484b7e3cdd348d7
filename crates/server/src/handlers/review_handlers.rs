//! # Review Queue Handlers
//!
//! `/api/submission-approval/*`: what reviewers (admins and collaborators)
//! work from. Decisions go through the same state machine as the admin
//! action endpoint.

use super::{wrap_response, ApiResponse, AppError, AppState};
use crate::auth::middleware::ReviewerUser;
use axum::{
    extract::{Path, State},
    Json,
};
use medreturn::{
    reference::{self, Criterion},
    review::{self, ApprovalDecision, ReviewOutcome, SubmissionDetail},
    stats::{self, ReviewStatistics},
    submissions::SubmissionView,
};

/// Active criteria, for filling in a classification.
pub async fn review_criteria_handler(
    State(app_state): State<AppState>,
    _reviewer: ReviewerUser,
) -> Result<Json<ApiResponse<Vec<Criterion>>>, AppError> {
    let conn = app_state.store.read().await?;
    Ok(wrap_response(reference::list_criteria(&conn, true).await?))
}

pub async fn pending_queue_handler(
    State(app_state): State<AppState>,
    _reviewer: ReviewerUser,
) -> Result<Json<ApiResponse<Vec<SubmissionView>>>, AppError> {
    let conn = app_state.store.read().await?;
    Ok(wrap_response(review::pending_queue(&conn).await?))
}

pub async fn review_detail_handler(
    State(app_state): State<AppState>,
    _reviewer: ReviewerUser,
    Path(submission_id): Path<String>,
) -> Result<Json<ApiResponse<SubmissionDetail>>, AppError> {
    let conn = app_state.store.read().await?;
    Ok(wrap_response(
        review::submission_detail(&conn, &submission_id).await?,
    ))
}

pub async fn approve_submission_handler(
    State(app_state): State<AppState>,
    ReviewerUser(reviewer): ReviewerUser,
    Path(submission_id): Path<String>,
    Json(payload): Json<ApprovalDecision>,
) -> Result<Json<ApiResponse<ReviewOutcome>>, AppError> {
    let outcome =
        review::approve_pending(&app_state.store, &reviewer, &submission_id, &payload).await?;
    Ok(wrap_response(outcome))
}

pub async fn review_statistics_handler(
    State(app_state): State<AppState>,
    _reviewer: ReviewerUser,
) -> Result<Json<ApiResponse<ReviewStatistics>>, AppError> {
    let conn = app_state.store.read().await?;
    Ok(wrap_response(stats::review_statistics(&conn).await?))
}
