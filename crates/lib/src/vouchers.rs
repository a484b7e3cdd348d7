//! # Vouchers
//!
//! Admin catalogue management and point redemption. [`redeem_voucher`] runs
//! every check and every effect in a single write transaction, so a failed
//! redemption leaves balance and stock exactly as they were.

use crate::{
    errors::DomainError,
    notifications::{self, OutgoingNotification},
    points,
    store::{columns, Store},
    types::{normalize_date, parse_date, NotificationKind, VoucherStatus},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use turso::{params, Connection, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voucher {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub points_cost: i64,
    pub remaining: i64,
    pub status: String,
    pub expires_on: Option<String>,
    pub created_at: String,
}

const VOUCHER_COLUMNS: &str =
    "id, name, description, points_cost, remaining, status, expires_on, created_at";

impl TryFrom<&Row> for Voucher {
    type Error = DomainError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Voucher {
            id: columns::text(row, 0)?,
            name: columns::text(row, 1)?,
            description: columns::opt_text(row, 2)?,
            points_cost: columns::integer(row, 3)?,
            remaining: columns::integer(row, 4)?,
            status: columns::text(row, 5)?,
            expires_on: columns::opt_text(row, 6)?,
            created_at: columns::text(row, 7)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoucherInput {
    #[serde(alias = "ten_voucher")]
    pub name: String,
    #[serde(alias = "mo_ta", default)]
    pub description: Option<String>,
    #[serde(alias = "diem_can_thiet")]
    pub points_cost: i64,
    #[serde(alias = "so_luong_con_lai")]
    pub remaining: i64,
    #[serde(alias = "trang_thai", default)]
    pub status: Option<String>,
    #[serde(alias = "ngay_het_han", default)]
    pub expires_on: Option<String>,
}

struct CheckedVoucher {
    status: VoucherStatus,
    expires_on: Option<String>,
}

fn check_input(input: &VoucherInput) -> Result<CheckedVoucher, DomainError> {
    if input.name.trim().is_empty() {
        return Err(DomainError::validation("Tên voucher không được để trống"));
    }
    if input.points_cost < 0 {
        return Err(DomainError::validation("Điểm cần thiết không được âm"));
    }
    if input.remaining < 0 {
        return Err(DomainError::validation("Số lượng còn lại không được âm"));
    }
    let status = match input.status.as_deref() {
        None => VoucherStatus::Active,
        Some(raw) => VoucherStatus::parse(raw).ok_or_else(|| {
            DomainError::validation(format!("Trạng thái voucher '{raw}' không hợp lệ"))
        })?,
    };
    let expires_on = normalize_date(input.expires_on.as_deref())?;
    Ok(CheckedVoucher { status, expires_on })
}

pub async fn create_voucher(conn: &Connection, input: &VoucherInput) -> Result<Voucher, DomainError> {
    let checked = check_input(input)?;
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO vouchers (id, name, description, points_cost, remaining, status, expires_on, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id.as_str(),
            input.name.trim(),
            input.description.as_deref(),
            input.points_cost,
            input.remaining,
            checked.status.as_str(),
            checked.expires_on.as_deref(),
            columns::timestamp_now()
        ],
    )
    .await?;
    info!(voucher_id = %id, "Voucher created");
    get_voucher(conn, &id).await
}

pub async fn find_voucher(conn: &Connection, id: &str) -> Result<Option<Voucher>, DomainError> {
    let sql = format!("SELECT {VOUCHER_COLUMNS} FROM vouchers WHERE id = ?");
    let mut rows = conn.query(&sql, params![id]).await?;
    match rows.next().await? {
        Some(row) => Ok(Some(Voucher::try_from(&row)?)),
        None => Ok(None),
    }
}

pub async fn get_voucher(conn: &Connection, id: &str) -> Result<Voucher, DomainError> {
    find_voucher(conn, id)
        .await?
        .ok_or_else(|| DomainError::not_found("Không tìm thấy voucher"))
}

pub async fn update_voucher(
    conn: &Connection,
    id: &str,
    input: &VoucherInput,
) -> Result<Voucher, DomainError> {
    let checked = check_input(input)?;
    let changed = conn
        .execute(
            "UPDATE vouchers SET name = ?, description = ?, points_cost = ?, remaining = ?, status = ?, expires_on = ? WHERE id = ?",
            params![
                input.name.trim(),
                input.description.as_deref(),
                input.points_cost,
                input.remaining,
                checked.status.as_str(),
                checked.expires_on.as_deref(),
                id
            ],
        )
        .await?;
    if changed == 0 {
        return Err(DomainError::not_found("Không tìm thấy voucher"));
    }
    get_voucher(conn, id).await
}

/// Admin listing, optionally restricted to one status.
pub async fn list_vouchers(
    conn: &Connection,
    status: Option<VoucherStatus>,
) -> Result<Vec<Voucher>, DomainError> {
    let mut rows = match status {
        Some(status) => {
            let sql = format!(
                "SELECT {VOUCHER_COLUMNS} FROM vouchers WHERE status = ? ORDER BY created_at DESC"
            );
            conn.query(&sql, params![status.as_str()]).await?
        }
        None => {
            let sql = format!("SELECT {VOUCHER_COLUMNS} FROM vouchers ORDER BY created_at DESC");
            conn.query(&sql, ()).await?
        }
    };
    let mut vouchers = Vec::new();
    while let Some(row) = rows.next().await? {
        vouchers.push(Voucher::try_from(&row)?);
    }
    Ok(vouchers)
}

/// Public catalogue: active vouchers, cheapest first.
pub async fn list_active(conn: &Connection) -> Result<Vec<Voucher>, DomainError> {
    let sql = format!(
        "SELECT {VOUCHER_COLUMNS} FROM vouchers WHERE status = ? ORDER BY points_cost ASC, name ASC"
    );
    let mut rows = conn
        .query(&sql, params![VoucherStatus::Active.as_str()])
        .await?;
    let mut vouchers = Vec::new();
    while let Some(row) = rows.next().await? {
        vouchers.push(Voucher::try_from(&row)?);
    }
    Ok(vouchers)
}

async fn usage_count(conn: &Connection, voucher_id: &str) -> Result<i64, DomainError> {
    let mut rows = conn
        .query(
            "SELECT COUNT(*) FROM voucher_usages WHERE voucher_id = ?",
            params![voucher_id],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(columns::integer(&row, 0)?),
        None => Ok(0),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Deletion {
    /// Redeemed at least once; kept for history and marked inactive.
    Deactivated,
    Removed,
}

pub async fn delete_voucher(conn: &Connection, id: &str) -> Result<Deletion, DomainError> {
    get_voucher(conn, id).await?;
    if usage_count(conn, id).await? > 0 {
        conn.execute(
            "UPDATE vouchers SET status = ? WHERE id = ?",
            params![VoucherStatus::Inactive.as_str(), id],
        )
        .await?;
        info!(voucher_id = id, "Voucher deactivated");
        return Ok(Deletion::Deactivated);
    }
    conn.execute("DELETE FROM vouchers WHERE id = ?", params![id])
        .await?;
    info!(voucher_id = id, "Voucher deleted");
    Ok(Deletion::Removed)
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Redemption {
    pub new_points: i64,
    pub points_deducted: i64,
}

async fn redeem_in_tx(
    conn: &Connection,
    user_id: &str,
    voucher_id: &str,
) -> Result<Redemption, DomainError> {
    let voucher = find_voucher(conn, voucher_id)
        .await?
        .filter(|v| v.status == VoucherStatus::Active.as_str())
        .ok_or_else(|| DomainError::not_found("Voucher không tồn tại hoặc đã hết hạn"))?;

    if let Some(expires_on) = voucher.expires_on.as_deref() {
        if parse_date(expires_on)? < Utc::now().date_naive() {
            return Err(DomainError::Expired);
        }
    }
    if voucher.remaining <= 0 {
        return Err(DomainError::Depleted);
    }
    let available = points::balance(conn, user_id).await?;
    if available < voucher.points_cost {
        return Err(DomainError::InsufficientPoints {
            required: voucher.points_cost,
            available,
        });
    }

    let reason = format!("Đổi voucher: {}", voucher.name);
    let new_points = points::debit(conn, user_id, voucher.points_cost, &reason).await?;
    conn.execute(
        "UPDATE vouchers SET remaining = remaining - 1 WHERE id = ? AND remaining > 0",
        params![voucher_id],
    )
    .await?;
    conn.execute(
        "INSERT INTO voucher_usages (id, voucher_id, user_id, redeemed_at, points_used) VALUES (?, ?, ?, ?, ?)",
        params![
            Uuid::new_v4().to_string(),
            voucher_id,
            user_id,
            columns::timestamp_now(),
            voucher.points_cost
        ],
    )
    .await?;
    let notice = OutgoingNotification::system(
        NotificationKind::Voucher,
        format!("Bạn đã đổi thành công voucher {}", voucher.name),
    );
    notifications::notify(conn, user_id, &notice).await?;

    Ok(Redemption {
        new_points,
        points_deducted: voucher.points_cost,
    })
}

/// Spends the user's points on one unit of the voucher.
///
/// Checks run in order: exists and active, not expired, in stock, enough
/// points. The writer lock held by the transaction serializes concurrent
/// redemptions, so the last unit is handed out once.
pub async fn redeem_voucher(
    store: &Store,
    user_id: &str,
    voucher_id: &str,
) -> Result<Redemption, DomainError> {
    let tx = store.write().await?;
    let result = redeem_in_tx(&tx, user_id, voucher_id).await;
    match &result {
        Ok(r) => info!(
            user_id,
            voucher_id,
            points_deducted = r.points_deducted,
            new_points = r.new_points,
            "Voucher redeemed"
        ),
        Err(e) => warn!(user_id, voucher_id, "Voucher redemption refused: {e}"),
    }
    tx.settle(result).await
}

#[derive(Debug, Clone, Serialize)]
pub struct VoucherStat {
    pub id: String,
    pub name: String,
    pub status: String,
    pub points_cost: i64,
    pub remaining: i64,
    pub times_redeemed: i64,
    pub points_spent: i64,
}

/// Per-voucher stock and usage figures.
pub async fn voucher_stats(conn: &Connection) -> Result<Vec<VoucherStat>, DomainError> {
    let mut rows = conn
        .query(
            "SELECT v.id, v.name, v.status, v.points_cost, v.remaining, COUNT(u.id), COALESCE(SUM(u.points_used), 0)
             FROM vouchers v
             LEFT JOIN voucher_usages u ON u.voucher_id = v.id
             GROUP BY v.id, v.name, v.status, v.points_cost, v.remaining
             ORDER BY v.name",
            (),
        )
        .await?;
    let mut stats = Vec::new();
    while let Some(row) = rows.next().await? {
        stats.push(VoucherStat {
            id: columns::text(&row, 0)?,
            name: columns::text(&row, 1)?,
            status: columns::text(&row, 2)?,
            points_cost: columns::integer(&row, 3)?,
            remaining: columns::integer(&row, 4)?,
            times_redeemed: columns::integer(&row, 5)?,
            points_spent: columns::integer(&row, 6)?,
        });
    }
    Ok(stats)
}
