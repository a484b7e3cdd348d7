//! Legacy session tokens, presented as `X-User-Id` + `X-Session-Token`.

use crate::{CoreAccessError, User, columns, find_user_by_id};
use chrono::{Duration, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Serialize;
use tracing::{debug, warn};
use turso::{Connection, params};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub user_id: String,
    pub session_token: String,
    pub expires_at: String,
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub async fn create_session(
    conn: &Connection,
    user_id: &str,
    ttl: Duration,
) -> Result<Session, CoreAccessError> {
    let now = Utc::now();
    let session = Session {
        user_id: user_id.to_string(),
        session_token: generate_token(),
        expires_at: columns::format_timestamp(now + ttl),
    };
    let created_at = columns::format_timestamp(now);

    conn.execute(
        "INSERT INTO user_sessions (id, user_id, session_token, is_active, expires_at, last_activity, created_at) VALUES (?, ?, ?, 1, ?, ?, ?)",
        params![
            Uuid::new_v4().to_string(),
            user_id,
            session.session_token.as_str(),
            session.expires_at.as_str(),
            created_at.as_str(),
            created_at.as_str()
        ],
    )
    .await?;
    debug!(user_id, "Created session");
    Ok(session)
}

/// Resolves a session pair to its user, touching `last_activity` on success.
///
/// Returns `Ok(None)` when the token is unknown, inactive, expired or owned by
/// someone else.
pub async fn validate_session(
    conn: &Connection,
    user_id: &str,
    token: &str,
) -> Result<Option<User>, CoreAccessError> {
    let mut rows = conn
        .query(
            "SELECT id, expires_at FROM user_sessions WHERE user_id = ? AND session_token = ? AND is_active = 1 LIMIT 1",
            params![user_id, token],
        )
        .await?;
    let Some(row) = rows.next().await? else {
        return Ok(None);
    };
    let session_id = columns::text(&row, 0)?;
    let expires_at = columns::timestamp(&row, 1)?;
    drop(rows);

    if expires_at <= Utc::now() {
        warn!(user_id, "Rejected expired session");
        return Ok(None);
    }

    conn.execute(
        "UPDATE user_sessions SET last_activity = ? WHERE id = ?",
        params![columns::timestamp_now(), session_id.as_str()],
    )
    .await?;

    find_user_by_id(conn, user_id).await
}

pub async fn revoke_session(
    conn: &Connection,
    user_id: &str,
    token: &str,
) -> Result<bool, CoreAccessError> {
    let changed = conn
        .execute(
            "UPDATE user_sessions SET is_active = 0 WHERE user_id = ? AND session_token = ?",
            params![user_id, token],
        )
        .await?;
    Ok(changed > 0)
}
