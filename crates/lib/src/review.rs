//! # Review
//!
//! The reviewer state machine. A submission leaves `pending` exactly once,
//! through one of the four actions, and everything that transition implies
//! (status, classification, points, ledger, notification) commits or rolls
//! back together.
//!
//! Two entry points share the machine:
//!
//! - [`apply_review_action`]: admin tool, any action, either point rule, optional override.
//! - [`approve_pending`]: review queue, approve or reject only, system point rule.

use crate::{
    classification::{self, ClassificationEntry, ClassificationResult},
    constants::{
        DEFAULT_RECALL_NOTE, DEFAULT_REJECT_NOTE, DEFAULT_RETURN_NOTE, PHARMACY_POINTS_FLOOR,
        PHARMACY_POINTS_PER_TEN, SYSTEM_POINTS_FLOOR, SYSTEM_POINTS_PER_TEN,
    },
    errors::DomainError,
    notifications::{self, OutgoingNotification},
    points,
    store::{columns, Store},
    submissions::{self, Submission, SubmissionFilter, SubmissionView, SUBMISSION_COLUMNS},
    types::{NotificationKind, Outcome, PointsSystem, ReviewAction, SubmissionStatus},
};
use core_access::User;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use turso::{params, Connection};

/// Admin reviewer action payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRequest {
    #[serde(alias = "hanh_dong")]
    pub action: String,
    #[serde(default)]
    pub points_system: Option<String>,
    #[serde(alias = "diem_thuong", default)]
    pub points: Option<i64>,
    #[serde(alias = "ghi_chu", default)]
    pub note: Option<String>,
    #[serde(default)]
    pub classifications: Vec<ClassificationEntry>,
}

/// Review-queue decision payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalDecision {
    #[serde(alias = "ket_qua")]
    pub decision: String,
    #[serde(alias = "ghi_chu", default)]
    pub note: Option<String>,
    #[serde(default)]
    pub classifications: Vec<ClassificationEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    pub submission_id: String,
    pub status: SubmissionStatus,
    pub points_awarded: i64,
    pub classification: Option<ClassificationResult>,
}

/// Points for an approved submission.
///
/// A non-negative override is used verbatim. Otherwise every full ten units
/// earn the per-ten rate, with a floor for small hand-ins. A quantity whose
/// award does not fit in an `i64` is a validation error.
pub fn compute_award(
    quantity: i64,
    system: PointsSystem,
    override_points: Option<i64>,
) -> Result<i64, DomainError> {
    if let Some(points) = override_points.filter(|p| *p >= 0) {
        return Ok(points);
    }
    let (floor, per_ten) = match system {
        PointsSystem::Pharmacy => (PHARMACY_POINTS_FLOOR, PHARMACY_POINTS_PER_TEN),
        PointsSystem::System => (SYSTEM_POINTS_FLOOR, SYSTEM_POINTS_PER_TEN),
    };
    let earned = (quantity / 10)
        .checked_mul(per_ten)
        .ok_or_else(|| DomainError::validation("Số điểm thưởng vượt quá giới hạn"))?;
    Ok(floor.max(earned))
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn notice_for(status: SubmissionStatus, points: i64, note: Option<&str>) -> String {
    let note = note.map(str::trim).filter(|n| !n.is_empty());
    match status {
        SubmissionStatus::Approved => format!(
            "Hồ sơ nộp thuốc của bạn đã được duyệt. Bạn nhận được {points} điểm!"
        ),
        SubmissionStatus::Rejected => format!(
            "Hồ sơ nộp thuốc của bạn đã bị từ chối. Lý do: {}",
            note.unwrap_or(DEFAULT_REJECT_NOTE)
        ),
        SubmissionStatus::ReturnedToPharmacy => format!(
            "Hồ sơ nộp thuốc của bạn đã được trả về nhà thuốc. Lý do: {}",
            note.unwrap_or(DEFAULT_RETURN_NOTE)
        ),
        SubmissionStatus::Recalled => format!(
            "Hồ sơ nộp thuốc của bạn đã bị thu hồi. Lý do: {}",
            note.unwrap_or(DEFAULT_RECALL_NOTE)
        ),
        SubmissionStatus::Pending => "Hồ sơ nộp thuốc của bạn đang chờ duyệt.".to_string(),
    }
}

struct Transition<'a> {
    action_tag: &'a str,
    points_system: PointsSystem,
    override_points: Option<i64>,
    note: Option<&'a str>,
    entries: &'a [ClassificationEntry],
}

/// Loads the submission together with its submitter's balance.
async fn load_for_review(
    conn: &Connection,
    submission_id: &str,
) -> Result<(Submission, i64), DomainError> {
    let sql = format!(
        "SELECT {SUBMISSION_COLUMNS}, u.points FROM submissions s JOIN users u ON u.id = s.submitter_id WHERE s.id = ?"
    );
    let mut rows = conn.query(&sql, params![submission_id]).await?;
    match rows.next().await? {
        Some(row) => Ok((Submission::try_from(&row)?, columns::integer(&row, 12)?)),
        None => Err(DomainError::not_found("Không tìm thấy hồ sơ")),
    }
}

async fn run_transition(
    conn: &Connection,
    reviewer: &User,
    submission_id: &str,
    t: Transition<'_>,
) -> Result<ReviewOutcome, DomainError> {
    let (submission, balance_before) = load_for_review(conn, submission_id).await?;

    let action = ReviewAction::parse(t.action_tag.trim()).ok_or_else(|| {
        DomainError::InvalidInput(format!("Hành động không hợp lệ: {}", t.action_tag))
    })?;
    let target = action.target_status();

    if submission.status != SubmissionStatus::Pending.as_str() {
        return Err(DomainError::Conflict(format!(
            "Hồ sơ đã được xử lý (trạng thái hiện tại: {})",
            submission.status
        )));
    }

    let changed = conn
        .execute(
            "UPDATE submissions SET status = ?, note = COALESCE(?, note) WHERE id = ? AND status = ?",
            params![
                target.as_str(),
                t.note,
                submission_id,
                SubmissionStatus::Pending.as_str()
            ],
        )
        .await?;
    if changed == 0 {
        return Err(DomainError::Conflict("Hồ sơ đã được xử lý".to_string()));
    }

    let classification = if t.entries.is_empty() {
        None
    } else {
        let checked = classification::check_entries(conn, t.entries).await?;
        Some(
            classification::replace_classification(
                conn,
                submission_id,
                &reviewer.id,
                &checked,
                None,
                t.note,
            )
            .await?,
        )
    };

    let mut awarded = 0;
    if target == SubmissionStatus::Approved {
        awarded = compute_award(submission.quantity, t.points_system, t.override_points)?;
        let reason = format!(
            "Nộp thuốc thành công - Hồ sơ #{} ({})",
            short_id(submission_id),
            t.points_system
        );
        let balance_after =
            points::credit(conn, &submission.submitter_id, awarded, &reason).await?;
        conn.execute(
            "UPDATE submissions SET points_awarded = ? WHERE id = ?",
            params![awarded, submission_id],
        )
        .await?;
        info!(
            submission_id,
            awarded, balance_before, balance_after, "Submission approved"
        );
    } else {
        info!(submission_id, status = %target, "Submission closed without points");
    }

    let notice = OutgoingNotification::from_sender(
        reviewer.id.clone(),
        NotificationKind::Submission,
        notice_for(target, awarded, t.note),
    );
    notifications::notify(conn, &submission.submitter_id, &notice).await?;

    Ok(ReviewOutcome {
        submission_id: submission_id.to_string(),
        status: target,
        points_awarded: awarded,
        classification,
    })
}

/// Admin reviewer action. All effects share one write transaction.
pub async fn apply_review_action(
    store: &Store,
    reviewer: &User,
    submission_id: &str,
    request: &ReviewRequest,
) -> Result<ReviewOutcome, DomainError> {
    if !reviewer.is_admin() {
        return Err(DomainError::Forbidden("Chỉ quản trị viên được thực hiện".into()));
    }
    let points_system = request
        .points_system
        .as_deref()
        .and_then(PointsSystem::parse)
        .unwrap_or_default();

    let tx = store.write().await?;
    let result = run_transition(
        &tx,
        reviewer,
        submission_id,
        Transition {
            action_tag: &request.action,
            points_system,
            override_points: request.points,
            note: request.note.as_deref(),
            entries: &request.classifications,
        },
    )
    .await;
    if let Err(e) = &result {
        warn!(submission_id, reviewer_id = %reviewer.id, "Review action failed: {e}");
    }
    tx.settle(result).await
}

/// Review-queue decision: `approved` or `rejected`, system point rule only.
pub async fn approve_pending(
    store: &Store,
    reviewer: &User,
    submission_id: &str,
    decision: &ApprovalDecision,
) -> Result<ReviewOutcome, DomainError> {
    if !reviewer.is_reviewer() {
        return Err(DomainError::Forbidden("Không có quyền duyệt hồ sơ".into()));
    }
    let action_tag = match decision.decision.trim() {
        "approved" => ReviewAction::Approve.as_str(),
        "rejected" => ReviewAction::Reject.as_str(),
        other => {
            return Err(DomainError::validation(format!(
                "Kết quả duyệt '{other}' không hợp lệ, chỉ chấp nhận approved hoặc rejected"
            )))
        }
    };

    let tx = store.write().await?;
    let result = run_transition(
        &tx,
        reviewer,
        submission_id,
        Transition {
            action_tag,
            points_system: PointsSystem::System,
            override_points: None,
            note: decision.note.as_deref(),
            entries: &decision.classifications,
        },
    )
    .await;
    tx.settle(result).await
}

/// Classification without a status change. The aggregate is derived from
/// the entries unless `overall` is given.
pub async fn classify_submission(
    store: &Store,
    reviewer: &User,
    submission_id: &str,
    entries: &[ClassificationEntry],
    overall: Option<Outcome>,
    notes: Option<&str>,
) -> Result<ClassificationResult, DomainError> {
    if !reviewer.is_reviewer() {
        return Err(DomainError::Forbidden("Không có quyền phân loại hồ sơ".into()));
    }
    let tx = store.write().await?;
    let result = async {
        classification::ensure_submission_exists(&tx, submission_id).await?;
        let checked = classification::check_entries(&tx, entries).await?;
        classification::replace_classification(&tx, submission_id, &reviewer.id, &checked, overall, notes)
            .await
    }
    .await;
    tx.settle(result).await
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionDetail {
    pub submission: SubmissionView,
    pub classification: Option<ClassificationResult>,
}

/// The pending queue, oldest first.
pub async fn pending_queue(conn: &Connection) -> Result<Vec<SubmissionView>, DomainError> {
    let filter = SubmissionFilter {
        status: Some(SubmissionStatus::Pending),
        ..SubmissionFilter::default()
    };
    let mut views = submissions::list_submissions(conn, &filter).await?;
    views.reverse();
    Ok(views)
}

pub async fn submission_detail(
    conn: &Connection,
    submission_id: &str,
) -> Result<SubmissionDetail, DomainError> {
    let filter = SubmissionFilter {
        id: Some(submission_id.to_string()),
        ..SubmissionFilter::default()
    };
    let view = submissions::list_submissions(conn, &filter)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| DomainError::not_found("Không tìm thấy hồ sơ"))?;
    let classification = classification::result_for_submission(conn, submission_id).await?;
    Ok(SubmissionDetail {
        submission: view,
        classification,
    })
}
