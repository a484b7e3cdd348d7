//! # Point Ledger
//!
//! Every change to `users.points` goes through [`credit`] or [`debit`], which
//! write the balance delta and an immutable ledger row in the caller's
//! transaction. [`reconcile`] checks that the two still agree.

use crate::{
    constants::LEDGER_STATUS_COMPLETED,
    errors::DomainError,
    store::columns,
};
use serde::Serialize;
use tracing::info;
use turso::{params, Connection};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub id: String,
    pub user_id: String,
    pub amount: i64,
    pub reason: String,
    pub status: String,
    pub created_at: String,
}

impl TryFrom<&turso::Row> for LedgerEntry {
    type Error = DomainError;

    fn try_from(row: &turso::Row) -> Result<Self, Self::Error> {
        Ok(LedgerEntry {
            id: columns::text(row, 0)?,
            user_id: columns::text(row, 1)?,
            amount: columns::integer(row, 2)?,
            reason: columns::text(row, 3)?,
            status: columns::text(row, 4)?,
            created_at: columns::text(row, 5)?,
        })
    }
}

/// Current balance of a user.
pub async fn balance(conn: &Connection, user_id: &str) -> Result<i64, DomainError> {
    let mut rows = conn
        .query("SELECT points FROM users WHERE id = ?", params![user_id])
        .await?;
    match rows.next().await? {
        Some(row) => Ok(columns::integer(&row, 0)?),
        None => Err(DomainError::not_found("Không tìm thấy người dùng")),
    }
}

async fn apply(
    conn: &Connection,
    user_id: &str,
    amount: i64,
    reason: &str,
) -> Result<i64, DomainError> {
    let current = balance(conn, user_id).await?;
    let next = current
        .checked_add(amount)
        .ok_or_else(|| DomainError::validation("Số điểm vượt quá giới hạn"))?;
    if next < 0 {
        return Err(DomainError::InsufficientPoints {
            required: -amount,
            available: current,
        });
    }

    conn.execute(
        "UPDATE users SET points = ? WHERE id = ?",
        params![next, user_id],
    )
    .await?;
    conn.execute(
        "INSERT INTO point_ledger (id, user_id, amount, reason, status, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        params![
            Uuid::new_v4().to_string(),
            user_id,
            amount,
            reason,
            LEDGER_STATUS_COMPLETED,
            columns::timestamp_now()
        ],
    )
    .await?;

    info!(user_id, amount, balance = next, "Point balance changed");
    Ok(next)
}

/// Adds `amount` (≥ 0) to the balance. Returns the new balance.
pub async fn credit(
    conn: &Connection,
    user_id: &str,
    amount: i64,
    reason: &str,
) -> Result<i64, DomainError> {
    if amount < 0 {
        return Err(DomainError::validation("Số điểm cộng không được âm"));
    }
    apply(conn, user_id, amount, reason).await
}

/// Removes `amount` (≥ 0) from the balance, failing with
/// `InsufficientPoints` rather than going negative.
pub async fn debit(
    conn: &Connection,
    user_id: &str,
    amount: i64,
    reason: &str,
) -> Result<i64, DomainError> {
    if amount < 0 {
        return Err(DomainError::validation("Số điểm trừ không được âm"));
    }
    apply(conn, user_id, -amount, reason).await
}

/// Signed adjustment used by admins; positive credits, negative debits.
pub async fn adjust(
    conn: &Connection,
    user_id: &str,
    delta: i64,
    reason: &str,
) -> Result<i64, DomainError> {
    if delta >= 0 {
        credit(conn, user_id, delta, reason).await
    } else {
        let amount = delta
            .checked_neg()
            .ok_or_else(|| DomainError::validation("Số điểm điều chỉnh vượt quá giới hạn"))?;
        debit(conn, user_id, amount, reason).await
    }
}

pub async fn ledger_for_user(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<LedgerEntry>, DomainError> {
    let mut rows = conn
        .query(
            "SELECT id, user_id, amount, reason, status, created_at FROM point_ledger WHERE user_id = ? ORDER BY created_at DESC",
            params![user_id],
        )
        .await?;
    let mut entries = Vec::new();
    while let Some(row) = rows.next().await? {
        entries.push(LedgerEntry::try_from(&row)?);
    }
    Ok(entries)
}

pub async fn all_entries(conn: &Connection, limit: i64) -> Result<Vec<LedgerEntry>, DomainError> {
    let mut rows = conn
        .query(
            "SELECT id, user_id, amount, reason, status, created_at FROM point_ledger ORDER BY created_at DESC LIMIT ?",
            params![limit],
        )
        .await?;
    let mut entries = Vec::new();
    while let Some(row) = rows.next().await? {
        entries.push(LedgerEntry::try_from(&row)?);
    }
    Ok(entries)
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Reconciliation {
    pub user_id: String,
    pub balance: i64,
    pub ledger_total: i64,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.balance == self.ledger_total
    }
}

/// Compares a user's balance with the sum of their ledger rows.
pub async fn reconcile(conn: &Connection, user_id: &str) -> Result<Reconciliation, DomainError> {
    let balance = balance(conn, user_id).await?;
    let mut rows = conn
        .query(
            "SELECT COALESCE(SUM(amount), 0) FROM point_ledger WHERE user_id = ?",
            params![user_id],
        )
        .await?;
    let ledger_total = match rows.next().await? {
        Some(row) => columns::integer(&row, 0)?,
        None => 0,
    };
    Ok(Reconciliation {
        user_id: user_id.to_string(),
        balance,
        ledger_total,
    })
}
