//! # Core Access Crate
//!
//! This crate is the central authority for identity, authentication (AuthN),
//! and authorization (AuthZ) logic for the `medreturn` application: user
//! records, role ranks, password verification and legacy session tokens.
//!
//! Every function takes a `turso::Connection` so that callers decide which
//! transaction the statement belongs to.

pub mod columns;
pub mod password;
pub mod session;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::info;
use turso::{Connection, Error as TursoError, Row, params};
use uuid::Uuid;

pub use password::{MIN_PASSWORD_LENGTH, hash_password, verify_password};
pub use session::{Session, create_session, revoke_session, validate_session};

#[derive(Error, Debug)]
pub enum CoreAccessError {
    #[error("Database error: {0}")]
    Database(#[from] TursoError),
    #[error("Email hoặc mật khẩu không đúng")]
    InvalidCredentials,
    #[error("{0} đã được sử dụng")]
    DuplicateIdentity(String),
    #[error("Mật khẩu phải có ít nhất {0} ký tự")]
    WeakPassword(usize),
    #[error("Vui lòng cung cấp email hoặc số điện thoại")]
    MissingIdentity,
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("Password hashing error: {0}")]
    PasswordHash(String),
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),
}

/// The three roles a user can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "USER")]
    User,
    #[serde(rename = "CONGTACVIEN")]
    Collaborator,
    #[serde(rename = "ADMIN")]
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Collaborator => "CONGTACVIEN",
            Role::Admin => "ADMIN",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "USER" => Some(Role::User),
            "CONGTACVIEN" => Some(Role::Collaborator),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Role::Admin => 3,
            Role::Collaborator => 2,
            Role::User => 1,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rank of a stored role string. Anything unrecognised ranks 0 and passes no gate.
pub fn role_rank(role: &str) -> u8 {
    Role::parse(role).map(|r| r.rank()).unwrap_or(0)
}

/// Represents a user in the system.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub id: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Stored as text; see [`role_rank`] for how it gates access.
    pub role: String,
    pub points: i64,
    pub wants_collaborator: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn rank(&self) -> u8 {
        role_rank(&self.role)
    }

    pub fn has_rank(&self, required: Role) -> bool {
        self.rank() >= required.rank()
    }

    pub fn is_admin(&self) -> bool {
        self.has_rank(Role::Admin)
    }

    /// Admins and collaborators may review submissions.
    pub fn is_reviewer(&self) -> bool {
        self.has_rank(Role::Collaborator)
    }
}

/// Column list matching the field order `User::try_from` expects.
pub const USER_COLUMNS: &str =
    "id, full_name, email, phone, address, role, points, wants_collaborator, created_at";

impl TryFrom<&Row> for User {
    type Error = CoreAccessError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(User {
            id: columns::text(row, 0)?,
            full_name: columns::text(row, 1)?,
            email: columns::opt_text(row, 2)?,
            phone: columns::opt_text(row, 3)?,
            address: columns::opt_text(row, 4)?,
            role: columns::text(row, 5)?,
            points: columns::integer(row, 6)?,
            wants_collaborator: columns::boolean(row, 7)?,
            created_at: columns::timestamp(row, 8)?,
        })
    }
}

/// Input for registering a new account.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    #[serde(alias = "ho_ten")]
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(alias = "so_dien_thoai", default)]
    pub phone: Option<String>,
    #[serde(alias = "dia_chi", default)]
    pub address: Option<String>,
    #[serde(alias = "mat_khau")]
    pub password: String,
}

/// Fields a user may change on their own profile.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    #[serde(alias = "ho_ten", default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(alias = "so_dien_thoai", default)]
    pub phone: Option<String>,
    #[serde(alias = "dia_chi", default)]
    pub address: Option<String>,
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn find_user_by_id(
    conn: &Connection,
    user_id: &str,
) -> Result<Option<User>, CoreAccessError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    let mut rows = conn.query(&sql, params![user_id]).await?;
    match rows.next().await? {
        Some(row) => Ok(Some(User::try_from(&row)?)),
        None => Ok(None),
    }
}

/// Loads a user that must exist.
pub async fn get_user(conn: &Connection, user_id: &str) -> Result<User, CoreAccessError> {
    find_user_by_id(conn, user_id)
        .await?
        .ok_or_else(|| CoreAccessError::UserNotFound(user_id.to_string()))
}

async fn identity_taken(
    conn: &Connection,
    column: &str,
    value: &str,
    except_id: Option<&str>,
) -> Result<bool, CoreAccessError> {
    // `column` is only ever one of the two literals below.
    let sql = format!("SELECT id FROM users WHERE {column} = ? LIMIT 1");
    let mut rows = conn.query(&sql, params![value]).await?;
    match rows.next().await? {
        Some(row) => {
            let owner = columns::text(&row, 0)?;
            Ok(except_id != Some(owner.as_str()))
        }
        None => Ok(false),
    }
}

async fn ensure_identity_free(
    conn: &Connection,
    email: Option<&str>,
    phone: Option<&str>,
    except_id: Option<&str>,
) -> Result<(), CoreAccessError> {
    if let Some(email) = email {
        if identity_taken(conn, "email", email, except_id).await? {
            return Err(CoreAccessError::DuplicateIdentity("Email".to_string()));
        }
    }
    if let Some(phone) = phone {
        if identity_taken(conn, "phone", phone, except_id).await? {
            return Err(CoreAccessError::DuplicateIdentity(
                "Số điện thoại".to_string(),
            ));
        }
    }
    Ok(())
}

/// Registers a new user with a hashed password.
///
/// The very first account in an empty database becomes `ADMIN`; every later
/// account starts as `USER` with zero points.
pub async fn register_user(conn: &Connection, input: NewUser) -> Result<User, CoreAccessError> {
    let email = normalize(input.email);
    let phone = normalize(input.phone);
    if email.is_none() && phone.is_none() {
        return Err(CoreAccessError::MissingIdentity);
    }
    ensure_identity_free(conn, email.as_deref(), phone.as_deref(), None).await?;

    let password_hash = hash_password(&input.password)?;

    let any_user_exists = conn
        .query("SELECT 1 FROM users LIMIT 1", ())
        .await?
        .next()
        .await?
        .is_some();
    let role = if any_user_exists { Role::User } else { Role::Admin };

    let user_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO users (id, full_name, email, phone, address, password_hash, role, points, wants_collaborator, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, 0, 0, ?)",
        params![
            user_id.as_str(),
            input.full_name.trim(),
            email.as_deref(),
            phone.as_deref(),
            normalize(input.address).as_deref(),
            password_hash.as_str(),
            role.as_str(),
            columns::timestamp_now()
        ],
    )
    .await?;
    info!(user_id = %user_id, role = %role, "Registered new user");

    get_user(conn, &user_id).await
}

/// Checks a login (email or phone) and password pair.
pub async fn verify_credentials(
    conn: &Connection,
    login: &str,
    password: &str,
) -> Result<User, CoreAccessError> {
    let login = login.trim();
    let sql = format!(
        "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ? OR phone = ? LIMIT 1"
    );
    let mut rows = conn.query(&sql, params![login, login]).await?;
    let Some(row) = rows.next().await? else {
        return Err(CoreAccessError::InvalidCredentials);
    };
    let stored_hash = columns::opt_text(&row, 9)?.unwrap_or_default();
    if !verify_password(password, &stored_hash) {
        return Err(CoreAccessError::InvalidCredentials);
    }
    User::try_from(&row)
}

pub async fn update_profile(
    conn: &Connection,
    user_id: &str,
    update: ProfileUpdate,
) -> Result<User, CoreAccessError> {
    let current = get_user(conn, user_id).await?;

    let email = normalize(update.email).or(current.email);
    let phone = normalize(update.phone).or(current.phone);
    let address = normalize(update.address).or(current.address);
    let full_name = normalize(update.full_name).unwrap_or(current.full_name);
    ensure_identity_free(conn, email.as_deref(), phone.as_deref(), Some(user_id)).await?;

    conn.execute(
        "UPDATE users SET full_name = ?, email = ?, phone = ?, address = ? WHERE id = ?",
        params![
            full_name.as_str(),
            email.as_deref(),
            phone.as_deref(),
            address.as_deref(),
            user_id
        ],
    )
    .await?;

    get_user(conn, user_id).await
}

pub async fn set_role(conn: &Connection, user_id: &str, role: Role) -> Result<(), CoreAccessError> {
    let changed = conn
        .execute(
            "UPDATE users SET role = ? WHERE id = ?",
            params![role.as_str(), user_id],
        )
        .await?;
    if changed == 0 {
        return Err(CoreAccessError::UserNotFound(user_id.to_string()));
    }
    info!(user_id, role = %role, "Updated user role");
    Ok(())
}

pub async fn set_collaborator_request(
    conn: &Connection,
    user_id: &str,
    wants: bool,
) -> Result<(), CoreAccessError> {
    let changed = conn
        .execute(
            "UPDATE users SET wants_collaborator = ? WHERE id = ?",
            params![i64::from(wants), user_id],
        )
        .await?;
    if changed == 0 {
        return Err(CoreAccessError::UserNotFound(user_id.to_string()));
    }
    Ok(())
}

pub async fn list_users(conn: &Connection) -> Result<Vec<User>, CoreAccessError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC");
    let mut rows = conn.query(&sql, ()).await?;
    let mut users = Vec::new();
    while let Some(row) = rows.next().await? {
        users.push(User::try_from(&row)?);
    }
    Ok(users)
}

/// Users that have flagged themselves as wanting to become collaborators.
pub async fn list_collaborator_requests(conn: &Connection) -> Result<Vec<User>, CoreAccessError> {
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users WHERE wants_collaborator = 1 AND role = 'USER' ORDER BY created_at ASC"
    );
    let mut rows = conn.query(&sql, ()).await?;
    let mut users = Vec::new();
    while let Some(row) = rows.next().await? {
        users.push(User::try_from(&row)?);
    }
    Ok(users)
}

/// Ids of every user holding one of `roles`.
pub async fn user_ids_with_roles(
    conn: &Connection,
    roles: &[Role],
) -> Result<Vec<String>, CoreAccessError> {
    let mut rows = conn
        .query("SELECT id, role FROM users ORDER BY created_at ASC", ())
        .await?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next().await? {
        let role = columns::text(&row, 1)?;
        if roles.iter().any(|r| r.as_str() == role) {
            ids.push(columns::text(&row, 0)?);
        }
    }
    Ok(ids)
}

pub async fn all_user_ids(conn: &Connection) -> Result<Vec<String>, CoreAccessError> {
    let mut rows = conn
        .query("SELECT id FROM users ORDER BY created_at ASC", ())
        .await?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next().await? {
        ids.push(columns::text(&row, 0)?);
    }
    Ok(ids)
}

/// Removes a user together with their sessions. Returns `false` if no such user.
pub async fn delete_user(conn: &Connection, user_id: &str) -> Result<bool, CoreAccessError> {
    conn.execute(
        "DELETE FROM user_sessions WHERE user_id = ?",
        params![user_id],
    )
    .await?;
    let deleted = conn
        .execute("DELETE FROM users WHERE id = ?", params![user_id])
        .await?;
    Ok(deleted > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use medreturn::store::Store;

    fn new_user(name: &str, email: Option<&str>, phone: Option<&str>) -> NewUser {
        NewUser {
            full_name: name.to_string(),
            email: email.map(str::to_string),
            phone: phone.map(str::to_string),
            address: None,
            password: "matkhau123".to_string(),
        }
    }

    async fn store() -> Store {
        let store = Store::open_in_memory().await.unwrap();
        store.initialize_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_register_first_user_becomes_admin() {
        // 1. Arrange
        let store = store().await;
        let tx = store.write().await.unwrap();

        // 2. Act
        let first = register_user(&tx, new_user("An", Some("an@example.com"), None))
            .await
            .unwrap();
        let second = register_user(&tx, new_user("Bình", None, Some("0901234567")))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        // 3. Assert
        assert_eq!(first.role, "ADMIN", "The first user should be admin");
        assert_eq!(second.role, "USER");
        assert_eq!(second.points, 0);
        assert!(first.is_admin() && first.is_reviewer());
        assert!(!second.is_reviewer());
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_missing_identity_and_weak_password() {
        // 1. Arrange
        let store = store().await;
        let tx = store.write().await.unwrap();
        register_user(&tx, new_user("An", Some("an@example.com"), Some("0901")))
            .await
            .unwrap();

        // 2. Act
        let dup_email = register_user(&tx, new_user("X", Some("an@example.com"), None)).await;
        let dup_phone = register_user(&tx, new_user("Y", None, Some("0901"))).await;
        let missing = register_user(&tx, new_user("Z", None, None)).await;
        let mut weak = new_user("W", Some("w@example.com"), None);
        weak.password = "123".to_string();
        let weak = register_user(&tx, weak).await;
        tx.commit().await.unwrap();

        // 3. Assert
        assert!(matches!(dup_email, Err(CoreAccessError::DuplicateIdentity(_))));
        assert!(matches!(dup_phone, Err(CoreAccessError::DuplicateIdentity(_))));
        assert!(matches!(missing, Err(CoreAccessError::MissingIdentity)));
        assert!(matches!(weak, Err(CoreAccessError::WeakPassword(6))));
    }

    #[tokio::test]
    async fn test_credentials_by_email_or_phone() {
        // 1. Arrange
        let store = store().await;
        let tx = store.write().await.unwrap();
        let user = register_user(&tx, new_user("An", Some("an@example.com"), Some("0901")))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        let conn = store.read().await.unwrap();

        // 2. Act
        let by_email = verify_credentials(&conn, "an@example.com", "matkhau123").await;
        let by_phone = verify_credentials(&conn, " 0901 ", "matkhau123").await;
        let wrong = verify_credentials(&conn, "an@example.com", "sai").await;
        let unknown = verify_credentials(&conn, "ghost@example.com", "matkhau123").await;

        // 3. Assert
        assert_eq!(by_email.unwrap().id, user.id);
        assert_eq!(by_phone.unwrap().id, user.id);
        assert!(matches!(wrong, Err(CoreAccessError::InvalidCredentials)));
        assert!(matches!(unknown, Err(CoreAccessError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_sessions_validate_until_revoked_or_expired() {
        // 1. Arrange
        let store = store().await;
        let tx = store.write().await.unwrap();
        let user = register_user(&tx, new_user("An", Some("an@example.com"), None))
            .await
            .unwrap();
        let live = create_session(&tx, &user.id, chrono::Duration::hours(24))
            .await
            .unwrap();
        let stale = create_session(&tx, &user.id, chrono::Duration::seconds(-1))
            .await
            .unwrap();

        // 2. Act & 3. Assert
        let found = validate_session(&tx, &user.id, &live.session_token)
            .await
            .unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id.clone()));
        assert!(validate_session(&tx, "someone-else", &live.session_token)
            .await
            .unwrap()
            .is_none());
        assert!(validate_session(&tx, &user.id, &stale.session_token)
            .await
            .unwrap()
            .is_none());

        revoke_session(&tx, &user.id, &live.session_token).await.unwrap();
        assert!(validate_session(&tx, &user.id, &live.session_token)
            .await
            .unwrap()
            .is_none());
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_role_ranks() {
        assert_eq!(role_rank("ADMIN"), 3);
        assert_eq!(role_rank("CONGTACVIEN"), 2);
        assert_eq!(role_rank("USER"), 1);
        assert_eq!(role_rank("root"), 0);
        assert_eq!(Role::parse("CONGTACVIEN"), Some(Role::Collaborator));
    }
}
