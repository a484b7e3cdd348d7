//! Counters for the admin dashboard, the review queue and the public
//! landing-page dashboard.

use crate::{
    constants::{
        DASHBOARD_MONTHS, DASHBOARD_TOP_MEDICINES, GOLD_TIER_POINTS, LEDGER_STATUS_COMPLETED,
        PLATINUM_TIER_POINTS, SILVER_TIER_POINTS, UNKNOWN_MEDICINE_LABEL,
    },
    errors::DomainError,
    points,
    store::columns,
    types::{Outcome, SubmissionStatus, VoucherStatus},
};
use chrono::{Datelike, Months, NaiveDate};
use core_access::{Role, User};
use serde::Serialize;
use std::collections::HashMap;
use turso::{params, Connection};

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SubmissionCounts {
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub returned: i64,
    pub recalled: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct VoucherCounts {
    pub active: i64,
    pub inactive: i64,
    pub total: i64,
    pub total_remaining: i64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct UserCounts {
    pub total: i64,
    pub users: i64,
    pub collaborators: i64,
    pub admins: i64,
    pub total_points: i64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PointCounts {
    pub total_transactions: i64,
    pub total_awarded: i64,
    pub total_spent: i64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub total: i64,
    pub dat: i64,
    pub khong_dat: i64,
    pub xem_xet: i64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct AdminStatistics {
    pub submissions: SubmissionCounts,
    pub vouchers: VoucherCounts,
    pub users: UserCounts,
    pub points: PointCounts,
    pub classifications: OutcomeCounts,
}

/// Runs a query returning a single row of integers.
async fn one_row(
    conn: &Connection,
    sql: &str,
    args: Vec<turso::Value>,
    width: usize,
) -> Result<Vec<i64>, DomainError> {
    let mut rows = conn.query(sql, args).await?;
    let Some(row) = rows.next().await? else {
        return Ok(vec![0; width]);
    };
    (0..width)
        .map(|i| columns::integer(&row, i).map_err(DomainError::from))
        .collect()
}

fn text(s: &str) -> turso::Value {
    turso::Value::Text(s.to_string())
}

pub async fn submission_counts(conn: &Connection) -> Result<SubmissionCounts, DomainError> {
    status_counts(conn, None).await
}

/// Status breakdown over all submissions, or over one submitter's.
async fn status_counts(
    conn: &Connection,
    submitter_id: Option<&str>,
) -> Result<SubmissionCounts, DomainError> {
    let mut sql = String::from(
        "SELECT
            COALESCE(SUM(CASE WHEN status = ? THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN status = ? THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN status = ? THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN status = ? THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN status = ? THEN 1 ELSE 0 END), 0),
            COUNT(*)
         FROM submissions",
    );
    let mut args = vec![
        text(SubmissionStatus::Pending.as_str()),
        text(SubmissionStatus::Approved.as_str()),
        text(SubmissionStatus::Rejected.as_str()),
        text(SubmissionStatus::ReturnedToPharmacy.as_str()),
        text(SubmissionStatus::Recalled.as_str()),
    ];
    if let Some(id) = submitter_id {
        sql.push_str(" WHERE submitter_id = ?");
        args.push(text(id));
    }
    let v = one_row(conn, &sql, args, 6).await?;
    Ok(SubmissionCounts {
        pending: v[0],
        approved: v[1],
        rejected: v[2],
        returned: v[3],
        recalled: v[4],
        total: v[5],
    })
}

async fn voucher_counts(conn: &Connection) -> Result<VoucherCounts, DomainError> {
    let v = one_row(
        conn,
        "SELECT
            COALESCE(SUM(CASE WHEN status = ? THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN status = ? THEN 1 ELSE 0 END), 0),
            COUNT(*),
            COALESCE(SUM(remaining), 0)
         FROM vouchers",
        vec![
            text(VoucherStatus::Active.as_str()),
            text(VoucherStatus::Inactive.as_str()),
        ],
        4,
    )
    .await?;
    Ok(VoucherCounts {
        active: v[0],
        inactive: v[1],
        total: v[2],
        total_remaining: v[3],
    })
}

async fn user_counts(conn: &Connection) -> Result<UserCounts, DomainError> {
    let v = one_row(
        conn,
        "SELECT
            COUNT(*),
            COALESCE(SUM(CASE WHEN role = ? THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN role = ? THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN role = ? THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(points), 0)
         FROM users",
        vec![
            text(Role::User.as_str()),
            text(Role::Collaborator.as_str()),
            text(Role::Admin.as_str()),
        ],
        5,
    )
    .await?;
    Ok(UserCounts {
        total: v[0],
        users: v[1],
        collaborators: v[2],
        admins: v[3],
        total_points: v[4],
    })
}

async fn point_counts(conn: &Connection) -> Result<PointCounts, DomainError> {
    let v = one_row(
        conn,
        "SELECT
            COUNT(*),
            COALESCE(SUM(CASE WHEN amount > 0 AND status = ? THEN amount ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN amount < 0 AND status = ? THEN -amount ELSE 0 END), 0)
         FROM point_ledger",
        vec![text(LEDGER_STATUS_COMPLETED), text(LEDGER_STATUS_COMPLETED)],
        3,
    )
    .await?;
    Ok(PointCounts {
        total_transactions: v[0],
        total_awarded: v[1],
        total_spent: v[2],
    })
}

async fn classification_counts(conn: &Connection) -> Result<OutcomeCounts, DomainError> {
    let v = one_row(
        conn,
        "SELECT
            COUNT(*),
            COALESCE(SUM(CASE WHEN overall = ? THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN overall = ? THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN overall = ? THEN 1 ELSE 0 END), 0)
         FROM classification_results",
        vec![
            text(Outcome::Dat.as_str()),
            text(Outcome::KhongDat.as_str()),
            text(Outcome::XemXet.as_str()),
        ],
        4,
    )
    .await?;
    Ok(OutcomeCounts {
        total: v[0],
        dat: v[1],
        khong_dat: v[2],
        xem_xet: v[3],
    })
}

pub async fn admin_statistics(conn: &Connection) -> Result<AdminStatistics, DomainError> {
    Ok(AdminStatistics {
        submissions: submission_counts(conn).await?,
        vouchers: voucher_counts(conn).await?,
        users: user_counts(conn).await?,
        points: point_counts(conn).await?,
        classifications: classification_counts(conn).await?,
    })
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CriterionStat {
    pub criterion_id: String,
    pub name: String,
    #[serde(flatten)]
    pub outcomes: OutcomeCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewStatistics {
    pub overview: SubmissionCounts,
    pub criteria_stats: Vec<CriterionStat>,
}

/// Queue overview plus per-criterion outcome counts for active criteria.
pub async fn review_statistics(conn: &Connection) -> Result<ReviewStatistics, DomainError> {
    let overview = submission_counts(conn).await?;
    let mut rows = conn
        .query(
            "SELECT c.id, c.name,
                COUNT(d.id),
                COALESCE(SUM(CASE WHEN d.outcome = ? THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN d.outcome = ? THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN d.outcome = ? THEN 1 ELSE 0 END), 0)
             FROM criteria c
             LEFT JOIN classification_details d ON d.criterion_id = c.id
             WHERE c.is_active = 1
             GROUP BY c.id, c.name
             ORDER BY c.name",
            params![
                Outcome::Dat.as_str(),
                Outcome::KhongDat.as_str(),
                Outcome::XemXet.as_str()
            ],
        )
        .await?;
    let mut criteria_stats = Vec::new();
    while let Some(row) = rows.next().await? {
        criteria_stats.push(CriterionStat {
            criterion_id: columns::text(&row, 0)?,
            name: columns::text(&row, 1)?,
            outcomes: OutcomeCounts {
                total: columns::integer(&row, 2)?,
                dat: columns::integer(&row, 3)?,
                khong_dat: columns::integer(&row, 4)?,
                xem_xet: columns::integer(&row, 5)?,
            },
        });
    }
    Ok(ReviewStatistics {
        overview,
        criteria_stats,
    })
}

// --- Public dashboard ---

/// One bar of a chart: a month label, a role or a medicine name with its count.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LabeledCount {
    pub label: String,
    pub value: i64,
}

/// Loyalty tier derived from the current balance.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

pub fn tier_for(points: i64) -> Tier {
    if points >= PLATINUM_TIER_POINTS {
        Tier::Platinum
    } else if points >= GOLD_TIER_POINTS {
        Tier::Gold
    } else if points >= SILVER_TIER_POINTS {
        Tier::Silver
    } else {
        Tier::Bronze
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewerStats {
    pub points: i64,
    pub level: Tier,
    pub submissions: i64,
    pub approved: i64,
    pub pending: i64,
    pub rejected: i64,
    pub returned: i64,
    pub recalled: i64,
    pub vouchers_used: i64,
    pub monthly_points: Vec<LabeledCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicDashboard {
    pub total_submissions: i64,
    pub pending_submissions: i64,
    pub processed_submissions: i64,
    pub total_users: i64,
    /// Vouchers with stock left, whatever their status.
    pub total_vouchers: i64,
    pub submission_trend: Vec<LabeledCount>,
    pub voucher_trend: Vec<LabeledCount>,
    pub user_role_distribution: Vec<LabeledCount>,
    pub medicine_distribution: Vec<LabeledCount>,
    /// Present only when the caller is signed in.
    pub user_stats: Option<ViewerStats>,
}

/// A calendar month as a `YYYY-MM` key (the prefix of stored timestamps)
/// and an `MM/YYYY` label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthSlot {
    pub key: String,
    pub label: String,
}

/// The last `months` calendar months up to and including `today`'s, oldest first.
pub fn month_series(today: NaiveDate, months: u32) -> Vec<MonthSlot> {
    let Some(first) = today.with_day(1) else {
        return Vec::new();
    };
    (0..months)
        .rev()
        .filter_map(|back| first.checked_sub_months(Months::new(back)))
        .map(|month| MonthSlot {
            key: month.format("%Y-%m").to_string(),
            label: month.format("%m/%Y").to_string(),
        })
        .collect()
}

/// One entry per slot; months without rows count as zero.
pub fn fill_series(slots: &[MonthSlot], counts: &HashMap<String, i64>) -> Vec<LabeledCount> {
    slots
        .iter()
        .map(|slot| LabeledCount {
            label: slot.label.clone(),
            value: counts.get(&slot.key).copied().unwrap_or(0),
        })
        .collect()
}

async fn labeled_counts(
    conn: &Connection,
    sql: &str,
    args: Vec<turso::Value>,
) -> Result<Vec<LabeledCount>, DomainError> {
    let mut rows = conn.query(sql, args).await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(LabeledCount {
            label: columns::text(&row, 0)?,
            value: columns::integer(&row, 1)?,
        });
    }
    Ok(out)
}

async fn monthly(
    conn: &Connection,
    sql: &str,
    args: Vec<turso::Value>,
    slots: &[MonthSlot],
) -> Result<Vec<LabeledCount>, DomainError> {
    let counts = labeled_counts(conn, sql, args)
        .await?
        .into_iter()
        .map(|c| (c.label, c.value))
        .collect();
    Ok(fill_series(slots, &counts))
}

fn series_start(slots: &[MonthSlot]) -> String {
    slots
        .first()
        .map(|slot| format!("{}-01", slot.key))
        .unwrap_or_default()
}

async fn viewer_stats(
    conn: &Connection,
    viewer: &User,
    slots: &[MonthSlot],
) -> Result<ViewerStats, DomainError> {
    let counts = status_counts(conn, Some(&viewer.id)).await?;
    let vouchers_used = one_row(
        conn,
        "SELECT COUNT(*) FROM voucher_usages WHERE user_id = ?",
        vec![text(&viewer.id)],
        1,
    )
    .await?[0];
    let monthly_points = monthly(
        conn,
        "SELECT substr(created_at, 1, 7), COALESCE(SUM(amount), 0)
         FROM point_ledger
         WHERE user_id = ? AND amount > 0 AND created_at >= ?
         GROUP BY substr(created_at, 1, 7)",
        vec![text(&viewer.id), text(&series_start(slots))],
        slots,
    )
    .await?;
    let points = points::balance(conn, &viewer.id).await?;
    Ok(ViewerStats {
        points,
        level: tier_for(points),
        submissions: counts.total,
        approved: counts.approved,
        pending: counts.pending,
        rejected: counts.rejected,
        returned: counts.returned,
        recalled: counts.recalled,
        vouchers_used,
        monthly_points,
    })
}

/// Most submitted active ingredients; unresolved types share one bucket.
async fn medicine_distribution(conn: &Connection) -> Result<Vec<LabeledCount>, DomainError> {
    let mut rows = conn
        .query(
            "SELECT m.active_ingredient, COUNT(*)
             FROM submissions s
             LEFT JOIN medicine_types m ON m.id = s.medicine_type_id
             GROUP BY m.active_ingredient
             ORDER BY COUNT(*) DESC, m.active_ingredient
             LIMIT ?",
            params![DASHBOARD_TOP_MEDICINES],
        )
        .await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(LabeledCount {
            label: columns::opt_text(&row, 0)?
                .unwrap_or_else(|| UNKNOWN_MEDICINE_LABEL.to_string()),
            value: columns::integer(&row, 1)?,
        });
    }
    Ok(out)
}

/// Program-wide figures for the landing page, plus the caller's own
/// progress when `viewer` is known. Trends cover the months up to `today`.
pub async fn public_dashboard(
    conn: &Connection,
    viewer: Option<&User>,
    today: NaiveDate,
) -> Result<PublicDashboard, DomainError> {
    let slots = month_series(today, DASHBOARD_MONTHS);
    let since = series_start(&slots);

    let submissions = submission_counts(conn).await?;
    let total_users = one_row(conn, "SELECT COUNT(*) FROM users", Vec::new(), 1).await?[0];
    let total_vouchers = one_row(
        conn,
        "SELECT COUNT(*) FROM vouchers WHERE remaining > 0",
        Vec::new(),
        1,
    )
    .await?[0];

    let submission_trend = monthly(
        conn,
        "SELECT substr(submitted_at, 1, 7), COUNT(*)
         FROM submissions
         WHERE submitted_at >= ?
         GROUP BY substr(submitted_at, 1, 7)",
        vec![text(&since)],
        &slots,
    )
    .await?;
    let voucher_trend = monthly(
        conn,
        "SELECT substr(redeemed_at, 1, 7), COUNT(*)
         FROM voucher_usages
         WHERE redeemed_at >= ?
         GROUP BY substr(redeemed_at, 1, 7)",
        vec![text(&since)],
        &slots,
    )
    .await?;
    let user_role_distribution = labeled_counts(
        conn,
        "SELECT role, COUNT(*) FROM users GROUP BY role ORDER BY role",
        Vec::new(),
    )
    .await?;
    let medicine_distribution = medicine_distribution(conn).await?;

    let user_stats = match viewer {
        Some(user) => Some(viewer_stats(conn, user, &slots).await?),
        None => None,
    };

    Ok(PublicDashboard {
        total_submissions: submissions.total,
        pending_submissions: submissions.pending,
        processed_submissions: submissions.total - submissions.pending,
        total_users,
        total_vouchers,
        submission_trend,
        voucher_trend,
        user_role_distribution,
        medicine_distribution,
        user_stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(tier_for(0), Tier::Bronze);
        assert_eq!(tier_for(149), Tier::Bronze);
        assert_eq!(tier_for(150), Tier::Silver);
        assert_eq!(tier_for(299), Tier::Silver);
        assert_eq!(tier_for(300), Tier::Gold);
        assert_eq!(tier_for(499), Tier::Gold);
        assert_eq!(tier_for(500), Tier::Platinum);
    }

    #[test]
    fn test_month_series_crosses_the_year_boundary() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        let keys: Vec<_> = month_series(today, 6).into_iter().map(|s| s.key).collect();
        assert_eq!(
            keys,
            ["2024-10", "2024-11", "2024-12", "2025-01", "2025-02", "2025-03"]
        );
        assert_eq!(month_series(today, 1)[0].label, "03/2025");
    }

    #[test]
    fn test_missing_months_are_zero_filled() {
        let slots = month_series(NaiveDate::from_ymd_opt(2025, 2, 10).unwrap(), 3);
        let counts = HashMap::from([("2025-01".to_string(), 4), ("2023-01".to_string(), 9)]);

        let series = fill_series(&slots, &counts);

        let values: Vec<_> = series.iter().map(|c| c.value).collect();
        assert_eq!(values, [0, 4, 0]);
        assert_eq!(series[0].label, "12/2024");
    }
}
