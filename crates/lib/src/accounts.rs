//! Admin-side account management that touches more than identity: role
//! changes combined with point adjustments, and guarded deletion.

use crate::{
    errors::DomainError,
    points,
    store::{columns, Store},
};
use core_access::{Role, User};
use serde::Deserialize;
use tracing::info;
use turso::{params, Connection};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminUserUpdate {
    #[serde(default)]
    pub role: Option<String>,
    /// Signed change to the balance, recorded in the ledger.
    #[serde(alias = "diem_dieu_chinh", default)]
    pub points_delta: Option<i64>,
    #[serde(alias = "ly_do", default)]
    pub reason: Option<String>,
}

pub async fn admin_update_user(
    store: &Store,
    admin: &User,
    user_id: &str,
    update: &AdminUserUpdate,
) -> Result<User, DomainError> {
    let role = update
        .role
        .as_deref()
        .map(|raw| {
            Role::parse(raw)
                .ok_or_else(|| DomainError::validation(format!("Vai trò '{raw}' không hợp lệ")))
        })
        .transpose()?;

    let tx = store.write().await?;
    let result: Result<User, DomainError> = async {
        core_access::get_user(&tx, user_id).await?;
        if let Some(role) = role {
            core_access::set_role(&tx, user_id, role).await?;
        }
        if let Some(delta) = update.points_delta.filter(|d| *d != 0) {
            let reason = update
                .reason
                .clone()
                .unwrap_or_else(|| format!("Điều chỉnh điểm bởi quản trị viên {}", admin.full_name));
            points::adjust(&tx, user_id, delta, &reason).await?;
        }
        Ok(core_access::get_user(&tx, user_id).await?)
    }
    .await;
    let user = tx.settle(result).await?;
    info!(user_id, admin_id = %admin.id, "User updated by admin");
    Ok(user)
}

async fn submission_count(conn: &Connection, user_id: &str) -> Result<i64, DomainError> {
    crate::submissions::count_for_user(conn, user_id).await
}

async fn count_for(conn: &Connection, sql: &str, user_id: &str) -> Result<i64, DomainError> {
    let mut rows = conn.query(sql, params![user_id]).await?;
    match rows.next().await? {
        Some(row) => Ok(columns::integer(&row, 0)?),
        None => Ok(0),
    }
}

/// Drops the user's support thread and direct messages with their receipts.
async fn delete_chat_history(conn: &Connection, user_id: &str) -> Result<(), DomainError> {
    let mut rows = conn
        .query(
            "SELECT id FROM messages WHERE conversation_id = ? OR sender_id = ? OR recipient_id = ?",
            params![user_id, user_id, user_id],
        )
        .await?;
    let mut message_ids = Vec::new();
    while let Some(row) = rows.next().await? {
        message_ids.push(columns::text(&row, 0)?);
    }
    for id in &message_ids {
        conn.execute(
            "DELETE FROM message_details WHERE message_id = ?",
            params![id.as_str()],
        )
        .await?;
        conn.execute("DELETE FROM messages WHERE id = ?", params![id.as_str()])
            .await?;
    }
    conn.execute(
        "DELETE FROM message_details WHERE user_id = ?",
        params![user_id],
    )
    .await?;
    Ok(())
}

/// Deletes a user with no submissions, point history or redeemed vouchers.
/// Those users are kept so review and ledger history stays intact. Sessions,
/// notifications and chat history go with the account.
pub async fn remove_user(store: &Store, admin: &User, user_id: &str) -> Result<(), DomainError> {
    if admin.id == user_id {
        return Err(DomainError::Conflict(
            "Không thể xóa tài khoản của chính mình".to_string(),
        ));
    }
    let tx = store.write().await?;
    let result: Result<(), DomainError> = async {
        if submission_count(&tx, user_id).await? > 0 {
            return Err(DomainError::Conflict(
                "Người dùng đã có hồ sơ nộp thuốc, không thể xóa".to_string(),
            ));
        }
        let ledger_rows = count_for(
            &tx,
            "SELECT COUNT(*) FROM point_ledger WHERE user_id = ?",
            user_id,
        )
        .await?;
        let usage_rows = count_for(
            &tx,
            "SELECT COUNT(*) FROM voucher_usages WHERE user_id = ?",
            user_id,
        )
        .await?;
        if ledger_rows > 0 || usage_rows > 0 {
            return Err(DomainError::Conflict(
                "Người dùng đã có lịch sử điểm thưởng, không thể xóa".to_string(),
            ));
        }
        delete_chat_history(&tx, user_id).await?;
        tx.execute(
            "DELETE FROM notifications WHERE recipient_id = ?",
            params![user_id],
        )
        .await?;
        if !core_access::delete_user(&tx, user_id).await? {
            return Err(DomainError::not_found("Không tìm thấy người dùng"));
        }
        Ok(())
    }
    .await;
    tx.settle(result).await?;
    info!(user_id, admin_id = %admin.id, "User deleted");
    Ok(())
}
