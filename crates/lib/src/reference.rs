//! # Reference Data
//!
//! Typed CRUD for the lookup tables submissions point at: partner pharmacies,
//! medicine types and evaluation criteria. Each table has its own input
//! struct, so no column name ever comes from a request.

use crate::{errors::DomainError, store::columns};
use serde::{Deserialize, Serialize};
use turso::{params, Connection, Row};
use uuid::Uuid;

fn required(value: &str, field: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} không được để trống")));
    }
    Ok(trimmed.to_string())
}

// --- Pharmacies ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pharmacy {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub opening_hours: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub note: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PharmacyInput {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub opening_hours: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub note: Option<String>,
}

const PHARMACY_COLUMNS: &str =
    "id, name, address, phone, opening_hours, latitude, longitude, note, created_at";

impl TryFrom<&Row> for Pharmacy {
    type Error = DomainError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Pharmacy {
            id: columns::text(row, 0)?,
            name: columns::text(row, 1)?,
            address: columns::opt_text(row, 2)?,
            phone: columns::opt_text(row, 3)?,
            opening_hours: columns::opt_text(row, 4)?,
            latitude: columns::opt_real(row, 5)?,
            longitude: columns::opt_real(row, 6)?,
            note: columns::opt_text(row, 7)?,
            created_at: columns::text(row, 8)?,
        })
    }
}

fn coordinate(value: Option<f64>) -> turso::Value {
    match value {
        Some(v) => turso::Value::Real(v),
        None => turso::Value::Null,
    }
}

fn opt_text_value(value: Option<&str>) -> turso::Value {
    match value {
        Some(v) => turso::Value::Text(v.to_string()),
        None => turso::Value::Null,
    }
}

pub async fn create_pharmacy(
    conn: &Connection,
    input: PharmacyInput,
) -> Result<Pharmacy, DomainError> {
    let name = required(&input.name, "Tên nhà thuốc")?;
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO pharmacies (id, name, address, phone, opening_hours, latitude, longitude, note, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        vec![
            turso::Value::Text(id.clone()),
            turso::Value::Text(name),
            opt_text_value(input.address.as_deref()),
            opt_text_value(input.phone.as_deref()),
            opt_text_value(input.opening_hours.as_deref()),
            coordinate(input.latitude),
            coordinate(input.longitude),
            opt_text_value(input.note.as_deref()),
            turso::Value::Text(columns::timestamp_now()),
        ],
    )
    .await?;
    get_pharmacy(conn, &id).await
}

pub async fn find_pharmacy(conn: &Connection, id: &str) -> Result<Option<Pharmacy>, DomainError> {
    let sql = format!("SELECT {PHARMACY_COLUMNS} FROM pharmacies WHERE id = ?");
    let mut rows = conn.query(&sql, params![id]).await?;
    match rows.next().await? {
        Some(row) => Ok(Some(Pharmacy::try_from(&row)?)),
        None => Ok(None),
    }
}

pub async fn get_pharmacy(conn: &Connection, id: &str) -> Result<Pharmacy, DomainError> {
    find_pharmacy(conn, id)
        .await?
        .ok_or_else(|| DomainError::not_found("Không tìm thấy nhà thuốc"))
}

pub async fn list_pharmacies(conn: &Connection) -> Result<Vec<Pharmacy>, DomainError> {
    let sql = format!("SELECT {PHARMACY_COLUMNS} FROM pharmacies ORDER BY name ASC");
    let mut rows = conn.query(&sql, ()).await?;
    let mut items = Vec::new();
    while let Some(row) = rows.next().await? {
        items.push(Pharmacy::try_from(&row)?);
    }
    Ok(items)
}

pub async fn update_pharmacy(
    conn: &Connection,
    id: &str,
    input: PharmacyInput,
) -> Result<Pharmacy, DomainError> {
    let name = required(&input.name, "Tên nhà thuốc")?;
    let changed = conn
        .execute(
            "UPDATE pharmacies SET name = ?, address = ?, phone = ?, opening_hours = ?, latitude = ?, longitude = ?, note = ? WHERE id = ?",
            vec![
                turso::Value::Text(name),
                opt_text_value(input.address.as_deref()),
                opt_text_value(input.phone.as_deref()),
                opt_text_value(input.opening_hours.as_deref()),
                coordinate(input.latitude),
                coordinate(input.longitude),
                opt_text_value(input.note.as_deref()),
                turso::Value::Text(id.to_string()),
            ],
        )
        .await?;
    if changed == 0 {
        return Err(DomainError::not_found("Không tìm thấy nhà thuốc"));
    }
    get_pharmacy(conn, id).await
}

pub async fn delete_pharmacy(conn: &Connection, id: &str) -> Result<(), DomainError> {
    let in_use = conn
        .query(
            "SELECT 1 FROM submissions WHERE pharmacy_id = ? LIMIT 1",
            params![id],
        )
        .await?
        .next()
        .await?
        .is_some();
    if in_use {
        return Err(DomainError::Conflict(
            "Nhà thuốc đang được sử dụng bởi hồ sơ nộp thuốc".to_string(),
        ));
    }
    let deleted = conn
        .execute("DELETE FROM pharmacies WHERE id = ?", params![id])
        .await?;
    if deleted == 0 {
        return Err(DomainError::not_found("Không tìm thấy nhà thuốc"));
    }
    Ok(())
}

// --- Medicine types ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicineType {
    pub id: String,
    pub active_ingredient: String,
    pub brand: Option<String>,
    pub strength: Option<String>,
    pub dosage_form: Option<String>,
    pub note: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedicineTypeInput {
    pub active_ingredient: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub strength: Option<String>,
    #[serde(default)]
    pub dosage_form: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

const MEDICINE_TYPE_COLUMNS: &str =
    "id, active_ingredient, brand, strength, dosage_form, note, created_at";

impl TryFrom<&Row> for MedicineType {
    type Error = DomainError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(MedicineType {
            id: columns::text(row, 0)?,
            active_ingredient: columns::text(row, 1)?,
            brand: columns::opt_text(row, 2)?,
            strength: columns::opt_text(row, 3)?,
            dosage_form: columns::opt_text(row, 4)?,
            note: columns::opt_text(row, 5)?,
            created_at: columns::text(row, 6)?,
        })
    }
}

pub async fn create_medicine_type(
    conn: &Connection,
    input: MedicineTypeInput,
) -> Result<MedicineType, DomainError> {
    let ingredient = required(&input.active_ingredient, "Hoạt chất")?;
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO medicine_types (id, active_ingredient, brand, strength, dosage_form, note, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            id.as_str(),
            ingredient.as_str(),
            input.brand.as_deref(),
            input.strength.as_deref(),
            input.dosage_form.as_deref(),
            input.note.as_deref(),
            columns::timestamp_now()
        ],
    )
    .await?;
    get_medicine_type(conn, &id).await
}

pub async fn find_medicine_type(
    conn: &Connection,
    id: &str,
) -> Result<Option<MedicineType>, DomainError> {
    let sql = format!("SELECT {MEDICINE_TYPE_COLUMNS} FROM medicine_types WHERE id = ?");
    let mut rows = conn.query(&sql, params![id]).await?;
    match rows.next().await? {
        Some(row) => Ok(Some(MedicineType::try_from(&row)?)),
        None => Ok(None),
    }
}

pub async fn get_medicine_type(conn: &Connection, id: &str) -> Result<MedicineType, DomainError> {
    find_medicine_type(conn, id)
        .await?
        .ok_or_else(|| DomainError::not_found("Không tìm thấy loại thuốc"))
}

pub async fn list_medicine_types(conn: &Connection) -> Result<Vec<MedicineType>, DomainError> {
    let sql = format!(
        "SELECT {MEDICINE_TYPE_COLUMNS} FROM medicine_types ORDER BY active_ingredient ASC"
    );
    let mut rows = conn.query(&sql, ()).await?;
    let mut items = Vec::new();
    while let Some(row) = rows.next().await? {
        items.push(MedicineType::try_from(&row)?);
    }
    Ok(items)
}

pub async fn update_medicine_type(
    conn: &Connection,
    id: &str,
    input: MedicineTypeInput,
) -> Result<MedicineType, DomainError> {
    let ingredient = required(&input.active_ingredient, "Hoạt chất")?;
    let changed = conn
        .execute(
            "UPDATE medicine_types SET active_ingredient = ?, brand = ?, strength = ?, dosage_form = ?, note = ? WHERE id = ?",
            params![
                ingredient.as_str(),
                input.brand.as_deref(),
                input.strength.as_deref(),
                input.dosage_form.as_deref(),
                input.note.as_deref(),
                id
            ],
        )
        .await?;
    if changed == 0 {
        return Err(DomainError::not_found("Không tìm thấy loại thuốc"));
    }
    get_medicine_type(conn, id).await
}

pub async fn delete_medicine_type(conn: &Connection, id: &str) -> Result<(), DomainError> {
    let in_use = conn
        .query(
            "SELECT 1 FROM submissions WHERE medicine_type_id = ? LIMIT 1",
            params![id],
        )
        .await?
        .next()
        .await?
        .is_some();
    if in_use {
        return Err(DomainError::Conflict(
            "Loại thuốc đang được sử dụng bởi hồ sơ nộp thuốc".to_string(),
        ));
    }
    let deleted = conn
        .execute("DELETE FROM medicine_types WHERE id = ?", params![id])
        .await?;
    if deleted == 0 {
        return Err(DomainError::not_found("Không tìm thấy loại thuốc"));
    }
    Ok(())
}

// --- Criteria ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Criterion {
    pub id: String,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub data_type: Option<String>,
    pub version: i64,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CriterionInput {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub version: Option<i64>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

const CRITERION_COLUMNS: &str =
    "id, code, name, description, data_type, version, is_active, created_at";

impl TryFrom<&Row> for Criterion {
    type Error = DomainError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Criterion {
            id: columns::text(row, 0)?,
            code: columns::text(row, 1)?,
            name: columns::text(row, 2)?,
            description: columns::opt_text(row, 3)?,
            data_type: columns::opt_text(row, 4)?,
            version: columns::integer(row, 5)?,
            is_active: columns::boolean(row, 6)?,
            created_at: columns::text(row, 7)?,
        })
    }
}

async fn code_taken(conn: &Connection, code: &str, except_id: Option<&str>) -> Result<bool, DomainError> {
    let mut rows = conn
        .query("SELECT id FROM criteria WHERE code = ?", params![code])
        .await?;
    match rows.next().await? {
        Some(row) => Ok(except_id != Some(columns::text(&row, 0)?.as_str())),
        None => Ok(false),
    }
}

pub async fn create_criterion(
    conn: &Connection,
    input: CriterionInput,
) -> Result<Criterion, DomainError> {
    let code = required(&input.code, "Mã tiêu chí")?;
    let name = required(&input.name, "Tên tiêu chí")?;
    if code_taken(conn, &code, None).await? {
        return Err(DomainError::validation(format!("Mã tiêu chí '{code}' đã tồn tại")));
    }
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO criteria (id, code, name, description, data_type, version, is_active, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id.as_str(),
            code.as_str(),
            name.as_str(),
            input.description.as_deref(),
            input.data_type.as_deref(),
            input.version.unwrap_or(1),
            i64::from(input.is_active.unwrap_or(true)),
            columns::timestamp_now()
        ],
    )
    .await?;
    get_criterion(conn, &id).await
}

pub async fn find_criterion(conn: &Connection, id: &str) -> Result<Option<Criterion>, DomainError> {
    let sql = format!("SELECT {CRITERION_COLUMNS} FROM criteria WHERE id = ?");
    let mut rows = conn.query(&sql, params![id]).await?;
    match rows.next().await? {
        Some(row) => Ok(Some(Criterion::try_from(&row)?)),
        None => Ok(None),
    }
}

pub async fn get_criterion(conn: &Connection, id: &str) -> Result<Criterion, DomainError> {
    find_criterion(conn, id)
        .await?
        .ok_or_else(|| DomainError::not_found("Không tìm thấy tiêu chí"))
}

/// All criteria, or only the active ones.
pub async fn list_criteria(conn: &Connection, active_only: bool) -> Result<Vec<Criterion>, DomainError> {
    let sql = if active_only {
        format!("SELECT {CRITERION_COLUMNS} FROM criteria WHERE is_active = 1 ORDER BY code ASC")
    } else {
        format!("SELECT {CRITERION_COLUMNS} FROM criteria ORDER BY code ASC")
    };
    let mut rows = conn.query(&sql, ()).await?;
    let mut items = Vec::new();
    while let Some(row) = rows.next().await? {
        items.push(Criterion::try_from(&row)?);
    }
    Ok(items)
}

pub async fn update_criterion(
    conn: &Connection,
    id: &str,
    input: CriterionInput,
) -> Result<Criterion, DomainError> {
    let current = get_criterion(conn, id).await?;
    let code = required(&input.code, "Mã tiêu chí")?;
    let name = required(&input.name, "Tên tiêu chí")?;
    if code_taken(conn, &code, Some(id)).await? {
        return Err(DomainError::validation(format!("Mã tiêu chí '{code}' đã tồn tại")));
    }
    conn.execute(
        "UPDATE criteria SET code = ?, name = ?, description = ?, data_type = ?, version = ?, is_active = ? WHERE id = ?",
        params![
            code.as_str(),
            name.as_str(),
            input.description.as_deref(),
            input.data_type.as_deref(),
            input.version.unwrap_or(current.version),
            i64::from(input.is_active.unwrap_or(current.is_active)),
            id
        ],
    )
    .await?;
    get_criterion(conn, id).await
}

/// Criteria referenced by classification details are deactivated instead of removed.
pub async fn delete_criterion(conn: &Connection, id: &str) -> Result<bool, DomainError> {
    get_criterion(conn, id).await?;
    let referenced = conn
        .query(
            "SELECT 1 FROM classification_details WHERE criterion_id = ? LIMIT 1",
            params![id],
        )
        .await?
        .next()
        .await?
        .is_some();
    if referenced {
        conn.execute("UPDATE criteria SET is_active = 0 WHERE id = ?", params![id])
            .await?;
        return Ok(false);
    }
    conn.execute("DELETE FROM criteria WHERE id = ?", params![id])
        .await?;
    Ok(true)
}
