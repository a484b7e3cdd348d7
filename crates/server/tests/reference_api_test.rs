//! # Reference Data API Tests
//!
//! Pharmacies, medicine types and criteria: readable by any signed-in user,
//! writable by admins, and protected from deletion while submissions or
//! classification results point at them.

mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{result_of, TestApp};
use core_access::Role;
use serde_json::json;

#[tokio::test]
async fn test_pharmacy_crud_is_admin_only() -> Result<()> {
    // --- 1. Arrange ---
    let app = TestApp::spawn().await?;
    let (_, admin_token) = app.user_with_token("Quản trị", Role::Admin).await?;
    let (_, user_token) = app.user_with_token("Người dùng", Role::User).await?;

    // --- 2. Act ---
    let forbidden = app
        .client
        .post(app.url("/api/pharmacies"))
        .bearer_auth(&user_token)
        .json(&json!({"name": "Nhà thuốc lậu"}))
        .send()
        .await?;
    let created = app
        .client
        .post(app.url("/api/pharmacies"))
        .bearer_auth(&admin_token)
        .json(&json!({
            "name": "  Nhà thuốc An Khang  ",
            "address": "12 Lê Lợi",
            "latitude": 10.77,
            "longitude": 106.7
        }))
        .send()
        .await?;
    assert_eq!(created.status(), StatusCode::CREATED);
    let created = result_of(created).await?;
    let id = created["id"].as_str().unwrap_or_default().to_string();

    let updated = app
        .client
        .put(app.url(&format!("/api/pharmacies/{id}")))
        .bearer_auth(&admin_token)
        .json(&json!({"name": "Nhà thuốc An Khang 2", "opening_hours": "7:00-22:00"}))
        .send()
        .await?;
    let listed = app
        .client
        .get(app.url("/api/pharmacies"))
        .bearer_auth(&user_token)
        .send()
        .await?;
    let deleted = app
        .client
        .delete(app.url(&format!("/api/pharmacies/{id}")))
        .bearer_auth(&admin_token)
        .send()
        .await?;
    let gone = app
        .client
        .get(app.url(&format!("/api/pharmacies/{id}")))
        .bearer_auth(&user_token)
        .send()
        .await?;

    // --- 3. Assert ---
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
    assert_eq!(created["name"], "Nhà thuốc An Khang");
    assert_eq!(created["latitude"], 10.77);

    let updated = result_of(updated).await?;
    assert_eq!(updated["name"], "Nhà thuốc An Khang 2");
    assert_eq!(updated["opening_hours"], "7:00-22:00");

    let listed = result_of(listed).await?;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));

    assert_eq!(deleted.status(), StatusCode::OK);
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_blank_names_are_rejected() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (_, admin_token) = app.user_with_token("Quản trị", Role::Admin).await?;

    let pharmacy = app
        .client
        .post(app.url("/api/pharmacies"))
        .bearer_auth(&admin_token)
        .json(&json!({"name": "   "}))
        .send()
        .await?;
    let medicine_type = app
        .client
        .post(app.url("/api/medicine-types"))
        .bearer_auth(&admin_token)
        .json(&json!({"active_ingredient": ""}))
        .send()
        .await?;

    assert_eq!(pharmacy.status(), StatusCode::BAD_REQUEST);
    assert_eq!(medicine_type.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.setup().count_rows("pharmacies", None).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_referenced_rows_are_protected() -> Result<()> {
    // --- 1. Arrange ---
    let app = TestApp::spawn().await?;
    let setup = app.setup();
    let (_, admin_token) = app.user_with_token("Quản trị", Role::Admin).await?;
    let (_, user_token) = app.user_with_token("Người nộp", Role::User).await?;
    let pharmacy = setup.seed_pharmacy("Nhà thuốc Pharmacity").await?;
    let medicine_type = setup.seed_medicine_type("Amoxicillin").await?;
    let used = setup.seed_criterion("TC01", "Bao bì nguyên vẹn").await?;
    let unused = setup.seed_criterion("TC02", "Còn hạn sử dụng").await?;

    let submission = app
        .client
        .post(app.url("/api/submissions"))
        .bearer_auth(&user_token)
        .json(&json!({
            "pharmacy_id": pharmacy.id,
            "medicine_type_id": medicine_type.id,
            "quantity": 20
        }))
        .send()
        .await?;
    let submission = result_of(submission).await?;
    let submission_id = submission["id"].as_str().unwrap_or_default().to_string();
    let classified = app
        .client
        .post(app.url(&format!("/api/submissions/{submission_id}/classify")))
        .bearer_auth(&admin_token)
        .json(&json!({"classifications": [{"criterion_id": used.id, "outcome": "DAT"}]}))
        .send()
        .await?;
    assert_eq!(classified.status(), StatusCode::OK);

    // --- 2. Act ---
    let delete_pharmacy = app
        .client
        .delete(app.url(&format!("/api/pharmacies/{}", pharmacy.id)))
        .bearer_auth(&admin_token)
        .send()
        .await?;
    let delete_medicine_type = app
        .client
        .delete(app.url(&format!("/api/medicine-types/{}", medicine_type.id)))
        .bearer_auth(&admin_token)
        .send()
        .await?;
    let delete_used = app
        .client
        .delete(app.url(&format!("/api/criteria/{}", used.id)))
        .bearer_auth(&admin_token)
        .send()
        .await?;
    let delete_unused = app
        .client
        .delete(app.url(&format!("/api/criteria/{}", unused.id)))
        .bearer_auth(&admin_token)
        .send()
        .await?;
    let active = app
        .client
        .get(app.url("/api/criteria?active_only=true"))
        .bearer_auth(&user_token)
        .send()
        .await?;
    let all = app
        .client
        .get(app.url("/api/criteria"))
        .bearer_auth(&user_token)
        .send()
        .await?;

    // --- 3. Assert ---
    assert_eq!(delete_pharmacy.status(), StatusCode::CONFLICT);
    assert_eq!(delete_medicine_type.status(), StatusCode::CONFLICT);
    assert_eq!(result_of(delete_used).await?["removed"], false);
    assert_eq!(result_of(delete_unused).await?["removed"], true);

    assert_eq!(result_of(active).await?.as_array().map(Vec::len), Some(0));
    let all = result_of(all).await?;
    assert_eq!(all.as_array().map(Vec::len), Some(1));
    assert_eq!(all[0]["code"], "TC01");
    assert_eq!(all[0]["is_active"], false);
    Ok(())
}

#[tokio::test]
async fn test_criterion_codes_are_unique() -> Result<()> {
    let app = TestApp::spawn().await?;
    let (_, admin_token) = app.user_with_token("Quản trị", Role::Admin).await?;
    let create = |code: &'static str| {
        app.client
            .post(app.url("/api/criteria"))
            .bearer_auth(&admin_token)
            .json(&json!({"code": code, "name": "Tiêu chí"}))
            .send()
    };

    let first = create("TC09").await?;
    let duplicate = create("TC09").await?;

    assert_eq!(first.status(), StatusCode::CREATED);
    let first = result_of(first).await?;
    assert_eq!(first["version"], 1);
    assert_eq!(first["is_active"], true);
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
