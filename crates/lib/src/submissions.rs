//! # Submissions
//!
//! Creation, reading and owner edits of medicine hand-in records. Reviewer
//! transitions live in [`crate::review`].

use crate::{
    constants::MAX_SUBMISSION_QUANTITY,
    errors::DomainError,
    notifications::{self, OutgoingNotification},
    reference,
    store::{columns, Store},
    types::{normalize_date, NotificationKind, SubmissionStatus},
};
use core_access::{Role, User};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use turso::{params, Connection, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub submitter_id: String,
    pub pharmacy_id: String,
    pub medicine_type_id: String,
    pub quantity: i64,
    pub unit: Option<String>,
    pub expiry_date: Option<String>,
    pub certificate_url: Option<String>,
    pub note: Option<String>,
    pub status: String,
    pub points_awarded: Option<i64>,
    pub submitted_at: String,
}

pub(crate) const SUBMISSION_COLUMNS: &str = "s.id, s.submitter_id, s.pharmacy_id, s.medicine_type_id, s.quantity, s.unit, s.expiry_date, s.certificate_url, s.note, s.status, s.points_awarded, s.submitted_at";

impl TryFrom<&Row> for Submission {
    type Error = DomainError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Submission {
            id: columns::text(row, 0)?,
            submitter_id: columns::text(row, 1)?,
            pharmacy_id: columns::text(row, 2)?,
            medicine_type_id: columns::text(row, 3)?,
            quantity: columns::integer(row, 4)?,
            unit: columns::opt_text(row, 5)?,
            expiry_date: columns::opt_text(row, 6)?,
            certificate_url: columns::opt_text(row, 7)?,
            note: columns::opt_text(row, 8)?,
            status: columns::text(row, 9)?,
            points_awarded: columns::opt_integer(row, 10)?,
            submitted_at: columns::text(row, 11)?,
        })
    }
}

/// A submission with the names of everything it references.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionView {
    #[serde(flatten)]
    pub submission: Submission,
    pub submitter_name: Option<String>,
    pub pharmacy_name: Option<String>,
    pub active_ingredient: Option<String>,
    pub brand: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSubmission {
    #[serde(alias = "id_nha_thuoc")]
    pub pharmacy_id: String,
    #[serde(alias = "id_loai_thuoc")]
    pub medicine_type_id: String,
    #[serde(alias = "so_luong")]
    pub quantity: i64,
    #[serde(alias = "don_vi_tinh", default)]
    pub unit: Option<String>,
    #[serde(alias = "han_dung", default)]
    pub expiry_date: Option<String>,
    #[serde(alias = "url_chung_nhan", default)]
    pub certificate_url: Option<String>,
    #[serde(alias = "ghi_chu", default)]
    pub note: Option<String>,
}

/// Owner-editable fields. Status and points are never touched here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmissionPatch {
    #[serde(alias = "id_nha_thuoc", default)]
    pub pharmacy_id: Option<String>,
    #[serde(alias = "id_loai_thuoc", default)]
    pub medicine_type_id: Option<String>,
    #[serde(alias = "so_luong", default)]
    pub quantity: Option<i64>,
    #[serde(alias = "don_vi_tinh", default)]
    pub unit: Option<String>,
    #[serde(alias = "han_dung", default)]
    pub expiry_date: Option<String>,
    #[serde(alias = "url_chung_nhan", default)]
    pub certificate_url: Option<String>,
    #[serde(alias = "ghi_chu", default)]
    pub note: Option<String>,
}

async fn check_references(
    conn: &Connection,
    pharmacy_id: &str,
    medicine_type_id: &str,
) -> Result<(), DomainError> {
    if reference::find_pharmacy(conn, pharmacy_id).await?.is_none() {
        return Err(DomainError::validation("Nhà thuốc không tồn tại"));
    }
    if reference::find_medicine_type(conn, medicine_type_id)
        .await?
        .is_none()
    {
        return Err(DomainError::validation("Loại thuốc không tồn tại"));
    }
    Ok(())
}

fn check_quantity(quantity: i64) -> Result<(), DomainError> {
    if quantity <= 0 {
        return Err(DomainError::validation("Số lượng phải lớn hơn 0"));
    }
    if quantity > MAX_SUBMISSION_QUANTITY {
        return Err(DomainError::validation(format!(
            "Số lượng không được vượt quá {MAX_SUBMISSION_QUANTITY}"
        )));
    }
    Ok(())
}

async fn insert_submission(
    conn: &Connection,
    submitter_id: &str,
    input: &NewSubmission,
) -> Result<Submission, DomainError> {
    check_quantity(input.quantity)?;
    let expiry_date = normalize_date(input.expiry_date.as_deref())?;
    check_references(conn, &input.pharmacy_id, &input.medicine_type_id).await?;

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO submissions (id, submitter_id, pharmacy_id, medicine_type_id, quantity, unit, expiry_date, certificate_url, note, status, points_awarded, submitted_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?)",
        params![
            id.as_str(),
            submitter_id,
            input.pharmacy_id.as_str(),
            input.medicine_type_id.as_str(),
            input.quantity,
            input.unit.as_deref(),
            expiry_date.as_deref(),
            input.certificate_url.as_deref(),
            input.note.as_deref(),
            SubmissionStatus::Pending.as_str(),
            columns::timestamp_now()
        ],
    )
    .await?;
    get_submission(conn, &id).await
}

/// Records a new `pending` submission, then tells every admin about it.
///
/// The admin fan-out happens after commit and is best-effort.
pub async fn create_submission(
    store: &Store,
    submitter: &User,
    input: NewSubmission,
) -> Result<Submission, DomainError> {
    let tx = store.write().await?;
    let result = insert_submission(&tx, &submitter.id, &input).await;
    let submission = tx.settle(result).await?;
    info!(
        submission_id = %submission.id,
        submitter_id = %submitter.id,
        "Submission created"
    );

    let admins = {
        let conn = store.read().await?;
        match core_access::user_ids_with_roles(&conn, &[Role::Admin]).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Could not load admins for new-submission notice: {e}");
                Vec::new()
            }
        }
    };
    let notice = OutgoingNotification::from_sender(
        submitter.id.clone(),
        NotificationKind::System,
        format!("Hồ sơ mới cần duyệt từ {}", submitter.full_name),
    );
    notifications::fan_out(store, &admins, &notice).await;

    Ok(submission)
}

pub async fn find_submission(
    conn: &Connection,
    id: &str,
) -> Result<Option<Submission>, DomainError> {
    let sql = format!("SELECT {SUBMISSION_COLUMNS} FROM submissions s WHERE s.id = ?");
    let mut rows = conn.query(&sql, params![id]).await?;
    match rows.next().await? {
        Some(row) => Ok(Some(Submission::try_from(&row)?)),
        None => Ok(None),
    }
}

pub async fn get_submission(conn: &Connection, id: &str) -> Result<Submission, DomainError> {
    find_submission(conn, id)
        .await?
        .ok_or_else(|| DomainError::not_found("Không tìm thấy hồ sơ"))
}

/// Which submissions a listing should include.
#[derive(Debug, Clone, Default)]
pub struct SubmissionFilter {
    /// A single submission by id.
    pub id: Option<String>,
    pub submitter_id: Option<String>,
    pub status: Option<SubmissionStatus>,
}

impl SubmissionFilter {
    /// Reviewers see everything unless they ask for their own; others only see their own.
    pub fn for_viewer(viewer: &User, mine_only: bool) -> Self {
        let submitter_id = if viewer.is_reviewer() && !mine_only {
            None
        } else {
            Some(viewer.id.clone())
        };
        Self {
            submitter_id,
            ..Self::default()
        }
    }
}

pub async fn list_submissions(
    conn: &Connection,
    filter: &SubmissionFilter,
) -> Result<Vec<SubmissionView>, DomainError> {
    let mut sql = format!(
        "SELECT {SUBMISSION_COLUMNS}, u.full_name, p.name, m.active_ingredient, m.brand
         FROM submissions s
         LEFT JOIN users u ON u.id = s.submitter_id
         LEFT JOIN pharmacies p ON p.id = s.pharmacy_id
         LEFT JOIN medicine_types m ON m.id = s.medicine_type_id
         WHERE 1 = 1"
    );
    let mut args: Vec<turso::Value> = Vec::new();
    if let Some(id) = &filter.id {
        sql.push_str(" AND s.id = ?");
        args.push(turso::Value::Text(id.clone()));
    }
    if let Some(submitter_id) = &filter.submitter_id {
        sql.push_str(" AND s.submitter_id = ?");
        args.push(turso::Value::Text(submitter_id.clone()));
    }
    if let Some(status) = filter.status {
        sql.push_str(" AND s.status = ?");
        args.push(turso::Value::Text(status.as_str().to_string()));
    }
    sql.push_str(" ORDER BY s.submitted_at DESC");

    let mut rows = conn.query(&sql, args).await?;
    let mut views = Vec::new();
    while let Some(row) = rows.next().await? {
        views.push(SubmissionView {
            submission: Submission::try_from(&row)?,
            submitter_name: columns::opt_text(&row, 12)?,
            pharmacy_name: columns::opt_text(&row, 13)?,
            active_ingredient: columns::opt_text(&row, 14)?,
            brand: columns::opt_text(&row, 15)?,
        });
    }
    Ok(views)
}

/// Reviewers may edit anything; the owner only while it is still pending.
fn ensure_can_modify(actor: &User, submission: &Submission) -> Result<(), DomainError> {
    if actor.is_reviewer() {
        return Ok(());
    }
    if submission.submitter_id == actor.id
        && submission.status == SubmissionStatus::Pending.as_str()
    {
        return Ok(());
    }
    Err(DomainError::Forbidden(
        "Không có quyền chỉnh sửa hồ sơ này".to_string(),
    ))
}

pub async fn update_submission(
    conn: &Connection,
    actor: &User,
    id: &str,
    patch: SubmissionPatch,
) -> Result<Submission, DomainError> {
    let current = get_submission(conn, id).await?;
    ensure_can_modify(actor, &current)?;

    let quantity = patch.quantity.unwrap_or(current.quantity);
    check_quantity(quantity)?;
    let pharmacy_id = patch.pharmacy_id.unwrap_or(current.pharmacy_id);
    let medicine_type_id = patch.medicine_type_id.unwrap_or(current.medicine_type_id);
    check_references(conn, &pharmacy_id, &medicine_type_id).await?;
    let expiry_date = match patch.expiry_date {
        Some(raw) => normalize_date(Some(&raw))?,
        None => current.expiry_date,
    };
    let unit = patch.unit.or(current.unit);
    let certificate_url = patch.certificate_url.or(current.certificate_url);
    let note = patch.note.or(current.note);

    conn.execute(
        "UPDATE submissions SET pharmacy_id = ?, medicine_type_id = ?, quantity = ?, unit = ?, expiry_date = ?, certificate_url = ?, note = ? WHERE id = ?",
        params![
            pharmacy_id.as_str(),
            medicine_type_id.as_str(),
            quantity,
            unit.as_deref(),
            expiry_date.as_deref(),
            certificate_url.as_deref(),
            note.as_deref(),
            id
        ],
    )
    .await?;
    info!(submission_id = id, actor_id = %actor.id, "Submission updated");
    get_submission(conn, id).await
}

/// Deletes a submission and its classification.
pub async fn delete_submission(conn: &Connection, actor: &User, id: &str) -> Result<(), DomainError> {
    let current = get_submission(conn, id).await?;
    ensure_can_modify(actor, &current)?;

    let result_ids = {
        let mut rows = conn
            .query(
                "SELECT id FROM classification_results WHERE submission_id = ?",
                params![id],
            )
            .await?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(columns::text(&row, 0)?);
        }
        ids
    };
    for result_id in result_ids {
        crate::classification::delete_result(conn, &result_id).await?;
    }
    conn.execute("DELETE FROM submissions WHERE id = ?", params![id])
        .await?;
    info!(submission_id = id, actor_id = %actor.id, "Submission deleted");
    Ok(())
}

pub async fn count_for_user(conn: &Connection, user_id: &str) -> Result<i64, DomainError> {
    let mut rows = conn
        .query(
            "SELECT COUNT(*) FROM submissions WHERE submitter_id = ?",
            params![user_id],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(columns::integer(&row, 0)?),
        None => Ok(0),
    }
}
