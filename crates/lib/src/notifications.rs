//! # Notifications
//!
//! Rows addressed to a single recipient. [`notify`] writes one row inside the
//! caller's transaction; [`fan_out`] writes one row per recipient and keeps
//! going past individual failures.

use crate::{
    constants::NOTIFICATION_LIST_LIMIT,
    errors::DomainError,
    store::{columns, Store},
    types::NotificationKind,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use turso::{params, Connection, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub sender_id: Option<String>,
    pub recipient_id: String,
    pub body: String,
    pub kind: String,
    pub is_read: bool,
    pub metadata: Option<Value>,
    pub created_at: String,
}

const NOTIFICATION_COLUMNS: &str =
    "id, sender_id, recipient_id, body, kind, is_read, metadata, created_at";

impl TryFrom<&Row> for Notification {
    type Error = DomainError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        let metadata = columns::opt_text(row, 6)?
            .map(|raw| serde_json::from_str(&raw))
            .transpose()?;
        Ok(Notification {
            id: columns::text(row, 0)?,
            sender_id: columns::opt_text(row, 1)?,
            recipient_id: columns::text(row, 2)?,
            body: columns::text(row, 3)?,
            kind: columns::text(row, 4)?,
            is_read: columns::boolean(row, 5)?,
            metadata,
            created_at: columns::text(row, 7)?,
        })
    }
}

/// What to send; the recipient is supplied separately.
#[derive(Debug, Clone)]
pub struct OutgoingNotification {
    pub sender_id: Option<String>,
    pub body: String,
    pub kind: NotificationKind,
    pub metadata: Option<Value>,
}

impl OutgoingNotification {
    pub fn system(kind: NotificationKind, body: impl Into<String>) -> Self {
        Self {
            sender_id: None,
            body: body.into(),
            kind,
            metadata: None,
        }
    }

    pub fn from_sender(
        sender_id: impl Into<String>,
        kind: NotificationKind,
        body: impl Into<String>,
    ) -> Self {
        Self {
            sender_id: Some(sender_id.into()),
            body: body.into(),
            kind,
            metadata: None,
        }
    }
}

/// Inserts one notification row and returns its id.
pub async fn notify(
    conn: &Connection,
    recipient_id: &str,
    outgoing: &OutgoingNotification,
) -> Result<String, DomainError> {
    let id = Uuid::new_v4().to_string();
    let metadata = outgoing
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    conn.execute(
        "INSERT INTO notifications (id, sender_id, recipient_id, body, kind, is_read, metadata, created_at) VALUES (?, ?, ?, ?, ?, 0, ?, ?)",
        params![
            id.as_str(),
            outgoing.sender_id.as_deref(),
            recipient_id,
            outgoing.body.as_str(),
            outgoing.kind.as_str(),
            metadata.as_deref(),
            columns::timestamp_now()
        ],
    )
    .await?;
    Ok(id)
}

/// Sends the same notification to each recipient, each in its own write.
///
/// Failures are logged and skipped; the return value is the number of rows
/// actually written.
pub async fn fan_out(
    store: &Store,
    recipients: &[String],
    outgoing: &OutgoingNotification,
) -> usize {
    let mut sent = 0;
    for recipient_id in recipients {
        let result: Result<String, DomainError> = async {
            let tx = store.write().await?;
            let res = notify(&tx, recipient_id, outgoing).await;
            tx.settle(res).await
        }
        .await;
        match result {
            Ok(_) => sent += 1,
            Err(e) => warn!(recipient_id, "Failed to deliver notification: {e}"),
        }
    }
    info!(
        kind = %outgoing.kind,
        sent,
        total = recipients.len(),
        "Notification fan-out finished"
    );
    sent
}

fn ensure_sendable(outgoing: &OutgoingNotification) -> Result<(), DomainError> {
    if !outgoing.kind.is_broadcastable() {
        return Err(DomainError::validation(format!(
            "Loại thông báo '{}' không hợp lệ",
            outgoing.kind
        )));
    }
    if outgoing.body.trim().is_empty() {
        return Err(DomainError::validation("Nội dung thông báo không được để trống"));
    }
    Ok(())
}

/// Admin broadcast: every user when `targets` is `None`, otherwise only the
/// listed ids that exist. Returns how many notifications were written.
pub async fn broadcast(
    store: &Store,
    targets: Option<&[String]>,
    outgoing: &OutgoingNotification,
) -> Result<usize, DomainError> {
    ensure_sendable(outgoing)?;

    let recipients = {
        let conn = store.read().await?;
        let all = core_access::all_user_ids(&conn).await?;
        match targets {
            Some(wanted) => {
                let (known, unknown): (Vec<String>, Vec<String>) =
                    wanted.iter().cloned().partition(|id| all.contains(id));
                if !unknown.is_empty() {
                    warn!(?unknown, "Skipping unknown broadcast recipients");
                }
                known
            }
            None => all,
        }
    };

    Ok(fan_out(store, &recipients, outgoing).await)
}

/// Admin message to a single user, who must exist.
pub async fn send_to_user(
    store: &Store,
    recipient_id: &str,
    outgoing: &OutgoingNotification,
) -> Result<String, DomainError> {
    ensure_sendable(outgoing)?;
    let tx = store.write().await?;
    let result: Result<String, DomainError> = async {
        if core_access::find_user_by_id(&tx, recipient_id).await?.is_none() {
            return Err(DomainError::not_found("Không tìm thấy người dùng"));
        }
        notify(&tx, recipient_id, outgoing).await
    }
    .await;
    tx.settle(result).await
}

/// The recipient's latest notifications, newest first.
pub async fn list_for_recipient(
    conn: &Connection,
    recipient_id: &str,
) -> Result<Vec<Notification>, DomainError> {
    let sql = format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE recipient_id = ? ORDER BY created_at DESC LIMIT ?"
    );
    let mut rows = conn
        .query(&sql, params![recipient_id, NOTIFICATION_LIST_LIMIT])
        .await?;
    let mut notifications = Vec::new();
    while let Some(row) = rows.next().await? {
        notifications.push(Notification::try_from(&row)?);
    }
    Ok(notifications)
}

pub async fn unread_count(conn: &Connection, recipient_id: &str) -> Result<i64, DomainError> {
    let mut rows = conn
        .query(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = ? AND is_read = 0",
            params![recipient_id],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(columns::integer(&row, 0)?),
        None => Ok(0),
    }
}

/// Marks one notification read. Only its recipient may do this.
pub async fn mark_read(
    conn: &Connection,
    recipient_id: &str,
    notification_id: &str,
) -> Result<(), DomainError> {
    let changed = conn
        .execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ? AND recipient_id = ?",
            params![notification_id, recipient_id],
        )
        .await?;
    if changed == 0 {
        return Err(DomainError::not_found("Không tìm thấy thông báo"));
    }
    Ok(())
}

pub async fn mark_all_read(conn: &Connection, recipient_id: &str) -> Result<u64, DomainError> {
    Ok(conn
        .execute(
            "UPDATE notifications SET is_read = 1 WHERE recipient_id = ? AND is_read = 0",
            params![recipient_id],
        )
        .await?)
}

pub async fn delete(
    conn: &Connection,
    recipient_id: &str,
    notification_id: &str,
) -> Result<(), DomainError> {
    let deleted = conn
        .execute(
            "DELETE FROM notifications WHERE id = ? AND recipient_id = ?",
            params![notification_id, recipient_id],
        )
        .await?;
    if deleted == 0 {
        return Err(DomainError::not_found("Không tìm thấy thông báo"));
    }
    Ok(())
}

/// Removes the recipient's read notifications; unread ones stay.
pub async fn clear_read(conn: &Connection, recipient_id: &str) -> Result<u64, DomainError> {
    Ok(conn
        .execute(
            "DELETE FROM notifications WHERE recipient_id = ? AND is_read = 1",
            params![recipient_id],
        )
        .await?)
}
