//! # Classification
//!
//! One result per submission with per-criterion details underneath it.
//! Writing a result always replaces the previous one wholesale, so repeating
//! an evaluation never accumulates detail rows.

use crate::{
    errors::DomainError,
    reference,
    store::columns,
    types::Outcome,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use turso::{params, Connection, Row};
use uuid::Uuid;

/// One per-criterion outcome as submitted by a reviewer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassificationEntry {
    #[serde(alias = "id_tieu_chi", default)]
    pub criterion_id: Option<String>,
    #[serde(alias = "ket_qua")]
    pub outcome: String,
    #[serde(alias = "gia_tri_do", default)]
    pub measured_value: Option<String>,
    #[serde(alias = "url_bang_chung", default)]
    pub evidence_url: Option<String>,
    #[serde(alias = "ghi_chu", default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationDetail {
    pub id: String,
    pub criterion_id: String,
    pub criterion_code: Option<String>,
    pub criterion_name: Option<String>,
    pub outcome: String,
    pub measured_value: Option<String>,
    pub evidence_url: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationResult {
    pub id: String,
    pub submission_id: String,
    pub overall: String,
    pub reviewer_id: Option<String>,
    pub notes: Option<String>,
    pub evaluated_at: String,
    pub details: Vec<ClassificationDetail>,
}

/// All `DAT` → `DAT`; otherwise any `KHONG_DAT` → `KHONG_DAT`; otherwise `XEM_XET`.
///
/// An empty set has no failing criterion and nothing confirmed, so it needs review.
pub fn aggregate_outcome(outcomes: &[Outcome]) -> Outcome {
    if outcomes.is_empty() {
        return Outcome::XemXet;
    }
    if outcomes.iter().all(|o| *o == Outcome::Dat) {
        Outcome::Dat
    } else if outcomes.contains(&Outcome::KhongDat) {
        Outcome::KhongDat
    } else {
        Outcome::XemXet
    }
}

/// An entry that passed validation against the criteria table.
#[derive(Debug, Clone)]
pub struct CheckedEntry {
    pub criterion_id: String,
    pub outcome: Outcome,
    pub measured_value: Option<String>,
    pub evidence_url: Option<String>,
    pub note: Option<String>,
}

/// Each entry needs a criterion id (`Validation`), an existing active
/// criterion (`NotFound`) and a known outcome (`Validation`).
pub async fn check_entries(
    conn: &Connection,
    entries: &[ClassificationEntry],
) -> Result<Vec<CheckedEntry>, DomainError> {
    let mut checked = Vec::with_capacity(entries.len());
    for entry in entries {
        let criterion_id = entry
            .criterion_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| DomainError::validation("Thiếu id_tieu_chi trong phân loại"))?;

        match reference::find_criterion(conn, criterion_id).await? {
            Some(criterion) if criterion.is_active => {}
            _ => {
                return Err(DomainError::not_found(format!(
                    "Tiêu chí {criterion_id} không tồn tại hoặc không hoạt động"
                )))
            }
        }

        let outcome = Outcome::parse(entry.outcome.trim()).ok_or_else(|| {
            DomainError::validation(format!(
                "Kết quả phân loại '{}' không hợp lệ",
                entry.outcome
            ))
        })?;

        checked.push(CheckedEntry {
            criterion_id: criterion_id.to_string(),
            outcome,
            measured_value: entry.measured_value.clone(),
            evidence_url: entry.evidence_url.clone(),
            note: entry.note.clone(),
        });
    }
    Ok(checked)
}

async fn delete_for_submission(conn: &Connection, submission_id: &str) -> Result<(), DomainError> {
    let existing = {
        let mut rows = conn
            .query(
                "SELECT id FROM classification_results WHERE submission_id = ?",
                params![submission_id],
            )
            .await?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(columns::text(&row, 0)?);
        }
        ids
    };
    for result_id in existing {
        conn.execute(
            "DELETE FROM classification_details WHERE result_id = ?",
            params![result_id.as_str()],
        )
        .await?;
        conn.execute(
            "DELETE FROM classification_results WHERE id = ?",
            params![result_id.as_str()],
        )
        .await?;
    }
    Ok(())
}

async fn insert_details(
    conn: &Connection,
    result_id: &str,
    entries: &[CheckedEntry],
) -> Result<(), DomainError> {
    for entry in entries {
        conn.execute(
            "INSERT INTO classification_details (id, result_id, criterion_id, outcome, measured_value, evidence_url, note) VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                Uuid::new_v4().to_string(),
                result_id,
                entry.criterion_id.as_str(),
                entry.outcome.as_str(),
                entry.measured_value.as_deref(),
                entry.evidence_url.as_deref(),
                entry.note.as_deref()
            ],
        )
        .await?;
    }
    Ok(())
}

/// Replaces the submission's classification with `entries`.
///
/// The aggregate is derived from the entries unless `overall` is given.
/// Runs inside the caller's transaction.
pub async fn replace_classification(
    conn: &Connection,
    submission_id: &str,
    reviewer_id: &str,
    entries: &[CheckedEntry],
    overall: Option<Outcome>,
    notes: Option<&str>,
) -> Result<ClassificationResult, DomainError> {
    let overall = overall.unwrap_or_else(|| {
        let outcomes: Vec<Outcome> = entries.iter().map(|e| e.outcome).collect();
        aggregate_outcome(&outcomes)
    });

    delete_for_submission(conn, submission_id).await?;

    let result_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO classification_results (id, submission_id, overall, reviewer_id, notes, evaluated_at) VALUES (?, ?, ?, ?, ?, ?)",
        params![
            result_id.as_str(),
            submission_id,
            overall.as_str(),
            reviewer_id,
            notes,
            columns::timestamp_now()
        ],
    )
    .await?;
    insert_details(conn, &result_id, entries).await?;

    info!(
        submission_id,
        overall = %overall,
        details = entries.len(),
        "Classification replaced"
    );
    get_result(conn, &result_id).await
}

/// Fails with `NotFound` unless the submission exists.
pub async fn ensure_submission_exists(
    conn: &Connection,
    submission_id: &str,
) -> Result<(), DomainError> {
    let exists = conn
        .query("SELECT 1 FROM submissions WHERE id = ?", params![submission_id])
        .await?
        .next()
        .await?
        .is_some();
    if !exists {
        return Err(DomainError::not_found("Không tìm thấy hồ sơ"));
    }
    Ok(())
}

/// Admin update: new aggregate and notes, and new details when supplied.
pub async fn update_result(
    conn: &Connection,
    result_id: &str,
    overall: Option<Outcome>,
    notes: Option<&str>,
    entries: Option<&[CheckedEntry]>,
) -> Result<ClassificationResult, DomainError> {
    let current = get_result(conn, result_id).await?;
    let overall = overall.map(|o| o.as_str().to_string()).unwrap_or(current.overall);
    let notes = notes.map(str::to_string).or(current.notes);

    conn.execute(
        "UPDATE classification_results SET overall = ?, notes = ?, evaluated_at = ? WHERE id = ?",
        params![
            overall.as_str(),
            notes.as_deref(),
            columns::timestamp_now(),
            result_id
        ],
    )
    .await?;

    if let Some(entries) = entries {
        conn.execute(
            "DELETE FROM classification_details WHERE result_id = ?",
            params![result_id],
        )
        .await?;
        insert_details(conn, result_id, entries).await?;
    }
    get_result(conn, result_id).await
}

pub async fn delete_result(conn: &Connection, result_id: &str) -> Result<(), DomainError> {
    conn.execute(
        "DELETE FROM classification_details WHERE result_id = ?",
        params![result_id],
    )
    .await?;
    let deleted = conn
        .execute(
            "DELETE FROM classification_results WHERE id = ?",
            params![result_id],
        )
        .await?;
    if deleted == 0 {
        return Err(DomainError::not_found("Không tìm thấy kết quả phân loại"));
    }
    Ok(())
}

const RESULT_COLUMNS: &str = "id, submission_id, overall, reviewer_id, notes, evaluated_at";

fn result_from_row(row: &Row) -> Result<ClassificationResult, DomainError> {
    Ok(ClassificationResult {
        id: columns::text(row, 0)?,
        submission_id: columns::text(row, 1)?,
        overall: columns::text(row, 2)?,
        reviewer_id: columns::opt_text(row, 3)?,
        notes: columns::opt_text(row, 4)?,
        evaluated_at: columns::text(row, 5)?,
        details: Vec::new(),
    })
}

async fn load_details(
    conn: &Connection,
    result_id: &str,
) -> Result<Vec<ClassificationDetail>, DomainError> {
    let mut rows = conn
        .query(
            "SELECT d.id, d.criterion_id, c.code, c.name, d.outcome, d.measured_value, d.evidence_url, d.note
             FROM classification_details d
             LEFT JOIN criteria c ON c.id = d.criterion_id
             WHERE d.result_id = ?
             ORDER BY c.code ASC",
            params![result_id],
        )
        .await?;
    let mut details = Vec::new();
    while let Some(row) = rows.next().await? {
        details.push(ClassificationDetail {
            id: columns::text(&row, 0)?,
            criterion_id: columns::text(&row, 1)?,
            criterion_code: columns::opt_text(&row, 2)?,
            criterion_name: columns::opt_text(&row, 3)?,
            outcome: columns::text(&row, 4)?,
            measured_value: columns::opt_text(&row, 5)?,
            evidence_url: columns::opt_text(&row, 6)?,
            note: columns::opt_text(&row, 7)?,
        });
    }
    Ok(details)
}

pub async fn get_result(conn: &Connection, result_id: &str) -> Result<ClassificationResult, DomainError> {
    let sql = format!("SELECT {RESULT_COLUMNS} FROM classification_results WHERE id = ?");
    let mut result = {
        let mut rows = conn.query(&sql, params![result_id]).await?;
        match rows.next().await? {
            Some(row) => result_from_row(&row)?,
            None => return Err(DomainError::not_found("Không tìm thấy kết quả phân loại")),
        }
    };
    result.details = load_details(conn, result_id).await?;
    Ok(result)
}

pub async fn result_for_submission(
    conn: &Connection,
    submission_id: &str,
) -> Result<Option<ClassificationResult>, DomainError> {
    let sql =
        format!("SELECT {RESULT_COLUMNS} FROM classification_results WHERE submission_id = ?");
    let found = {
        let mut rows = conn.query(&sql, params![submission_id]).await?;
        match rows.next().await? {
            Some(row) => Some(result_from_row(&row)?),
            None => None,
        }
    };
    match found {
        Some(mut result) => {
            result.details = load_details(conn, &result.id).await?;
            Ok(Some(result))
        }
        None => Ok(None),
    }
}

pub async fn list_results(conn: &Connection) -> Result<Vec<ClassificationResult>, DomainError> {
    let sql = format!(
        "SELECT {RESULT_COLUMNS} FROM classification_results ORDER BY evaluated_at DESC"
    );
    let mut results = {
        let mut rows = conn.query(&sql, ()).await?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(result_from_row(&row)?);
        }
        results
    };
    for result in results.iter_mut() {
        result.details = load_details(conn, &result.id).await?;
    }
    Ok(results)
}

/// Count of detail rows for a submission's current result.
pub async fn detail_count(conn: &Connection, submission_id: &str) -> Result<i64, DomainError> {
    let mut rows = conn
        .query(
            "SELECT COUNT(*) FROM classification_details d JOIN classification_results r ON r.id = d.result_id WHERE r.submission_id = ?",
            params![submission_id],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(columns::integer(&row, 0)?),
        None => Ok(0),
    }
}
