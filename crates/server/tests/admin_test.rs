//! # Admin Endpoint Tests
//!
//! This file contains integration tests for the admin-only endpoints,
//! covering role gates, the reviewer action endpoint, classification results,
//! notifications, collaborator requests and the reporting views.

mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{result_of, TestApp};
use core_access::{Role, User};
use serde_json::{json, Value};

struct AdminFixture {
    app: TestApp,
    admin: User,
    admin_token: String,
    user: User,
    user_token: String,
}

async fn admin_fixture() -> Result<AdminFixture> {
    let app = TestApp::spawn().await?;
    let (admin, admin_token) = app.user_with_token("Quản trị viên", Role::Admin).await?;
    let (user, user_token) = app.user_with_token("Người dùng", Role::User).await?;
    Ok(AdminFixture {
        app,
        admin,
        admin_token,
        user,
        user_token,
    })
}

/// A pending submission of `quantity` units by the fixture user.
async fn pending_submission(f: &AdminFixture, quantity: i64) -> Result<String> {
    let setup = f.app.setup();
    let pharmacy = setup.seed_pharmacy("Nhà thuốc An Khang").await?;
    let medicine_type = setup.seed_medicine_type("Amoxicillin").await?;
    let response = f
        .app
        .client
        .post(f.app.url("/api/submissions"))
        .bearer_auth(&f.user_token)
        .json(&json!({
            "pharmacy_id": pharmacy.id,
            "medicine_type_id": medicine_type.id,
            "quantity": quantity
        }))
        .send()
        .await?;
    let submission = result_of(response).await?;
    Ok(submission["id"].as_str().unwrap_or_default().to_string())
}

#[tokio::test]
async fn test_user_listing_is_admin_only() -> Result<()> {
    // --- 1. Arrange ---
    let f = admin_fixture().await?;

    // --- 2. Act ---
    let as_admin = f
        .app
        .client
        .get(f.app.url("/api/users"))
        .bearer_auth(&f.admin_token)
        .send()
        .await?;
    let as_user = f
        .app
        .client
        .get(f.app.url("/api/users"))
        .bearer_auth(&f.user_token)
        .send()
        .await?;
    let as_guest = f.app.client.get(f.app.url("/api/users")).send().await?;

    // --- 3. Assert ---
    assert_eq!(as_admin.status(), StatusCode::OK);
    let users = result_of(as_admin).await?;
    assert_eq!(users.as_array().map(Vec::len), Some(2));
    assert_eq!(as_user.status(), StatusCode::FORBIDDEN);
    assert_eq!(as_guest.status(), StatusCode::UNAUTHORIZED);
    let body: Value = as_guest.json().await?;
    assert_eq!(body["error"], "Authorization header missing.");
    Ok(())
}

#[tokio::test]
async fn test_admin_role_change_and_point_adjustment() -> Result<()> {
    // --- 1. Arrange ---
    let f = admin_fixture().await?;
    let setup = f.app.setup();

    // --- 2. Act ---
    let updated = f
        .app
        .client
        .put(f.app.url(&format!("/api/users/{}", f.user.id)))
        .bearer_auth(&f.admin_token)
        .json(&json!({"role": "CONGTACVIEN", "points_delta": 25, "reason": "Thưởng sự kiện"}))
        .send()
        .await?;
    let bad_role = f
        .app
        .client
        .put(f.app.url(&format!("/api/users/{}", f.user.id)))
        .bearer_auth(&f.admin_token)
        .json(&json!({"role": "SUPERUSER"}))
        .send()
        .await?;
    let ledger = f
        .app
        .client
        .get(f.app.url(&format!("/api/admin/points?user_id={}", f.user.id)))
        .bearer_auth(&f.admin_token)
        .send()
        .await?;

    // --- 3. Assert ---
    assert_eq!(updated.status(), StatusCode::OK);
    let user = result_of(updated).await?;
    assert_eq!(user["role"], "CONGTACVIEN");
    assert_eq!(user["points"], 25);
    assert_eq!(bad_role.status(), StatusCode::BAD_REQUEST);

    let ledger = result_of(ledger).await?;
    assert_eq!(ledger.as_array().map(Vec::len), Some(1));
    assert_eq!(ledger[0]["amount"], 25);
    assert_eq!(ledger[0]["reason"], "Thưởng sự kiện");
    assert_eq!(setup.balance(&f.user.id).await?, 25);
    Ok(())
}

#[tokio::test]
async fn test_out_of_range_point_adjustments_leave_balance_untouched() -> Result<()> {
    // --- 1. Arrange ---
    let f = admin_fixture().await?;
    let setup = f.app.setup();
    setup.seed_points(&f.user.id, 40).await?;
    let adjust = |delta: i64| {
        f.app
            .client
            .put(f.app.url(&format!("/api/users/{}", f.user.id)))
            .bearer_auth(&f.admin_token)
            .json(&json!({"points_delta": delta}))
            .send()
    };

    // --- 2. Act ---
    let min_delta = adjust(i64::MIN).await?;
    let max_delta = adjust(i64::MAX).await?;

    // --- 3. Assert ---
    assert_eq!(min_delta.status(), StatusCode::BAD_REQUEST);
    assert_eq!(max_delta.status(), StatusCode::BAD_REQUEST);
    assert_eq!(setup.balance(&f.user.id).await?, 40);
    Ok(())
}

#[tokio::test]
async fn test_user_deletion_rules() -> Result<()> {
    // --- 1. Arrange ---
    let f = admin_fixture().await?;
    let (bystander, _) = f.app.user_with_token("Không hồ sơ", Role::User).await?;
    pending_submission(&f, 10).await?;

    // --- 2. Act ---
    let delete_self = f
        .app
        .client
        .delete(f.app.url(&format!("/api/users/{}", f.admin.id)))
        .bearer_auth(&f.admin_token)
        .send()
        .await?;
    let delete_submitter = f
        .app
        .client
        .delete(f.app.url(&format!("/api/users/{}", f.user.id)))
        .bearer_auth(&f.admin_token)
        .send()
        .await?;
    let delete_bystander = f
        .app
        .client
        .delete(f.app.url(&format!("/api/users/{}", bystander.id)))
        .bearer_auth(&f.admin_token)
        .send()
        .await?;

    // --- 3. Assert ---
    assert_eq!(delete_self.status(), StatusCode::CONFLICT);
    assert_eq!(delete_submitter.status(), StatusCode::CONFLICT);
    assert_eq!(delete_bystander.status(), StatusCode::OK);
    assert_eq!(
        f.app
            .setup()
            .count_rows("users", Some(("id", &bystander.id)))
            .await?,
        0
    );
    Ok(())
}

#[tokio::test]
async fn test_deletion_keeps_point_history_and_clears_chat() -> Result<()> {
    // --- 1. Arrange ---
    let f = admin_fixture().await?;
    let setup = f.app.setup();
    let (earner, _) = f.app.user_with_token("Có điểm", Role::User).await?;
    setup.seed_points(&earner.id, 10).await?;
    let (chatter, chatter_token) = f.app.user_with_token("Hay hỏi", Role::User).await?;
    let asked = f
        .app
        .client
        .post(f.app.url("/api/chat/messages"))
        .bearer_auth(&chatter_token)
        .json(&json!({"content": "Nhà thuốc nào gần nhất?"}))
        .send()
        .await?;
    assert_eq!(asked.status(), StatusCode::CREATED);
    let answered = f
        .app
        .client
        .post(f.app.url("/api/chat/messages"))
        .bearer_auth(&f.admin_token)
        .json(&json!({"content": "Nhà thuốc An Khang", "recipient_id": chatter.id}))
        .send()
        .await?;
    assert_eq!(answered.status(), StatusCode::CREATED);

    // --- 2. Act ---
    let delete_earner = f
        .app
        .client
        .delete(f.app.url(&format!("/api/users/{}", earner.id)))
        .bearer_auth(&f.admin_token)
        .send()
        .await?;
    let delete_chatter = f
        .app
        .client
        .delete(f.app.url(&format!("/api/users/{}", chatter.id)))
        .bearer_auth(&f.admin_token)
        .send()
        .await?;

    // --- 3. Assert ---
    assert_eq!(delete_earner.status(), StatusCode::CONFLICT);
    assert_eq!(
        setup.count_rows("point_ledger", Some(("user_id", &earner.id))).await?,
        1
    );
    assert_eq!(setup.count_rows("users", Some(("id", &earner.id))).await?, 1);

    assert_eq!(delete_chatter.status(), StatusCode::OK);
    assert_eq!(setup.count_rows("messages", None).await?, 0);
    assert_eq!(setup.count_rows("message_details", None).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_pharmacy_approval_uses_pharmacy_rate() -> Result<()> {
    // --- 1. Arrange ---
    let f = admin_fixture().await?;
    let id = pending_submission(&f, 5).await?;

    // --- 2. Act ---
    let approved = f
        .app
        .client
        .post(f.app.url(&format!("/api/admin/submissions/{id}/action")))
        .bearer_auth(&f.admin_token)
        .json(&json!({"action": "approve", "points_system": "pharmacy"}))
        .send()
        .await?;
    let recall = f
        .app
        .client
        .post(f.app.url(&format!("/api/admin/submissions/{id}/action")))
        .bearer_auth(&f.admin_token)
        .json(&json!({"action": "recall"}))
        .send()
        .await?;

    // --- 3. Assert ---
    assert_eq!(approved.status(), StatusCode::OK);
    let outcome = result_of(approved).await?;
    assert_eq!(outcome["points_awarded"], 15);
    assert_eq!(recall.status(), StatusCode::CONFLICT);

    let approved_list = f
        .app
        .client
        .get(f.app.url("/api/admin/submissions?status=approved"))
        .bearer_auth(&f.admin_token)
        .send()
        .await?;
    let approved_list = result_of(approved_list).await?;
    assert_eq!(approved_list.as_array().map(Vec::len), Some(1));
    assert_eq!(approved_list[0]["points_awarded"], 15);
    Ok(())
}

#[tokio::test]
async fn test_rejection_notifies_submitter_with_default_reason() -> Result<()> {
    // --- 1. Arrange ---
    let f = admin_fixture().await?;
    let id = pending_submission(&f, 20).await?;

    // --- 2. Act ---
    let rejected = f
        .app
        .client
        .post(f.app.url(&format!("/api/admin/submissions/{id}/action")))
        .bearer_auth(&f.admin_token)
        .json(&json!({"hanh_dong": "reject"}))
        .send()
        .await?;
    let inbox = f
        .app
        .client
        .get(f.app.url("/api/notifications"))
        .bearer_auth(&f.user_token)
        .send()
        .await?;

    // --- 3. Assert ---
    assert_eq!(rejected.status(), StatusCode::OK);
    assert_eq!(result_of(rejected).await?["points_awarded"], 0);
    let inbox = result_of(inbox).await?;
    assert_eq!(inbox["unread_count"], 1);
    let body = inbox["notifications"][0]["body"].as_str().unwrap_or_default();
    assert!(body.contains("Không đạt tiêu chuẩn"), "got: {body}");
    assert_eq!(f.app.setup().balance(&f.user.id).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_unknown_action_is_rejected_and_state_kept() -> Result<()> {
    let f = admin_fixture().await?;
    let id = pending_submission(&f, 20).await?;

    let response = f
        .app
        .client
        .post(f.app.url(&format!("/api/admin/submissions/{id}/action")))
        .bearer_auth(&f.admin_token)
        .json(&json!({"action": "archive"}))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let pending = f
        .app
        .client
        .get(f.app.url("/api/admin/submissions?status=pending"))
        .bearer_auth(&f.admin_token)
        .send()
        .await?;
    assert_eq!(result_of(pending).await?.as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn test_classification_result_lifecycle() -> Result<()> {
    // --- 1. Arrange ---
    let f = admin_fixture().await?;
    let setup = f.app.setup();
    let c1 = setup.seed_criterion("TC01", "Bao bì").await?;
    let c2 = setup.seed_criterion("TC02", "Hạn dùng").await?;
    let id = pending_submission(&f, 10).await?;

    // --- 2. Act ---
    let created = f
        .app
        .client
        .post(f.app.url("/api/admin/classification-results"))
        .bearer_auth(&f.admin_token)
        .json(&json!({
            "submission_id": id,
            "classifications": [
                {"criterion_id": c1.id, "outcome": "DAT"},
                {"criterion_id": c2.id, "outcome": "XEM_XET"}
            ]
        }))
        .send()
        .await?;
    assert_eq!(created.status(), StatusCode::CREATED);
    let created = result_of(created).await?;
    let result_id = created["id"].as_str().unwrap_or_default().to_string();

    let updated = f
        .app
        .client
        .put(f.app.url(&format!("/api/admin/classification-results/{result_id}")))
        .bearer_auth(&f.admin_token)
        .json(&json!({
            "notes": "Đã kiểm tra lại",
            "classifications": [
                {"criterion_id": c1.id, "outcome": "DAT"},
                {"criterion_id": c2.id, "outcome": "DAT"}
            ]
        }))
        .send()
        .await?;
    let listed = f
        .app
        .client
        .get(f.app.url("/api/admin/classification-results"))
        .bearer_auth(&f.admin_token)
        .send()
        .await?;
    let deleted = f
        .app
        .client
        .delete(f.app.url(&format!("/api/admin/classification-results/{result_id}")))
        .bearer_auth(&f.admin_token)
        .send()
        .await?;
    let deleted_again = f
        .app
        .client
        .delete(f.app.url(&format!("/api/admin/classification-results/{result_id}")))
        .bearer_auth(&f.admin_token)
        .send()
        .await?;

    // --- 3. Assert ---
    assert_eq!(created["overall"], "XEM_XET");

    assert_eq!(updated.status(), StatusCode::OK);
    let updated = result_of(updated).await?;
    assert_eq!(updated["overall"], "DAT");
    assert_eq!(updated["notes"], "Đã kiểm tra lại");
    assert_eq!(updated["details"].as_array().map(Vec::len), Some(2));

    assert_eq!(result_of(listed).await?.as_array().map(Vec::len), Some(1));
    assert_eq!(deleted.status(), StatusCode::OK);
    assert_eq!(deleted_again.status(), StatusCode::NOT_FOUND);
    assert_eq!(setup.count_rows("classification_details", None).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_explicit_overall_overrides_the_derived_one() -> Result<()> {
    let f = admin_fixture().await?;
    let c1 = f.app.setup().seed_criterion("TC01", "Bao bì").await?;
    let id = pending_submission(&f, 10).await?;
    let create = |overall: &'static str| {
        f.app
            .client
            .post(f.app.url("/api/admin/classification-results"))
            .bearer_auth(&f.admin_token)
            .json(&json!({
                "id_ho_so": id,
                "chi_tiet": [{"id_tieu_chi": c1.id, "ket_qua": "DAT"}],
                "ket_qua_tong": overall
            }))
            .send()
    };

    let explicit = create("KHONG_DAT").await?;
    let invalid = create("TOT").await?;

    assert_eq!(explicit.status(), StatusCode::CREATED);
    assert_eq!(result_of(explicit).await?["overall"], "KHONG_DAT");
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        f.app
            .setup()
            .count_rows("classification_results", None)
            .await?,
        1
    );
    Ok(())
}

#[tokio::test]
async fn test_system_broadcast_and_direct_notification() -> Result<()> {
    // --- 1. Arrange ---
    let f = admin_fixture().await?;
    let setup = f.app.setup();

    // --- 2. Act ---
    let broadcast = f
        .app
        .client
        .post(f.app.url("/api/admin/notifications/system"))
        .bearer_auth(&f.admin_token)
        .json(&json!({"noi_dung": "Hệ thống bảo trì lúc 22h"}))
        .send()
        .await?;
    let targeted = f
        .app
        .client
        .post(f.app.url("/api/admin/notifications/system"))
        .bearer_auth(&f.admin_token)
        .json(&json!({"body": "Chỉ bạn", "user_ids": [f.user.id, "ghost"]}))
        .send()
        .await?;
    let direct = f
        .app
        .client
        .post(f.app.url("/api/admin/notifications/user"))
        .bearer_auth(&f.admin_token)
        .json(&json!({"recipient_id": f.user.id, "body": "Xin chào", "kind": "VOUCHER"}))
        .send()
        .await?;
    let to_nobody = f
        .app
        .client
        .post(f.app.url("/api/admin/notifications/user"))
        .bearer_auth(&f.admin_token)
        .json(&json!({"recipient_id": "ghost", "body": "Xin chào"}))
        .send()
        .await?;
    let bad_kind = f
        .app
        .client
        .post(f.app.url("/api/admin/notifications/system"))
        .bearer_auth(&f.admin_token)
        .json(&json!({"body": "x", "kind": "NOT_A_KIND"}))
        .send()
        .await?;

    // --- 3. Assert ---
    assert_eq!(result_of(broadcast).await?["sent"], 2);
    assert_eq!(result_of(targeted).await?["sent"], 1);
    assert_eq!(direct.status(), StatusCode::CREATED);
    assert_eq!(to_nobody.status(), StatusCode::NOT_FOUND);
    assert_eq!(bad_kind.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        setup
            .count_rows("notifications", Some(("recipient_id", &f.user.id)))
            .await?,
        3
    );
    Ok(())
}

#[tokio::test]
async fn test_collaborator_request_approval() -> Result<()> {
    // --- 1. Arrange ---
    let f = admin_fixture().await?;
    f.app
        .client
        .post(f.app.url("/api/users/collaborator-request"))
        .bearer_auth(&f.user_token)
        .send()
        .await?;

    // --- 2. Act ---
    let listed = f
        .app
        .client
        .get(f.app.url("/api/admin/collaborator-requests"))
        .bearer_auth(&f.admin_token)
        .send()
        .await?;
    let bad_action = f
        .app
        .client
        .post(f.app.url(&format!(
            "/api/admin/collaborator-requests/{}/maybe",
            f.user.id
        )))
        .bearer_auth(&f.admin_token)
        .send()
        .await?;
    let approved = f
        .app
        .client
        .post(f.app.url(&format!(
            "/api/admin/collaborator-requests/{}/approve",
            f.user.id
        )))
        .bearer_auth(&f.admin_token)
        .send()
        .await?;
    let second_decision = f
        .app
        .client
        .post(f.app.url(&format!(
            "/api/admin/collaborator-requests/{}/reject",
            f.user.id
        )))
        .bearer_auth(&f.admin_token)
        .send()
        .await?;

    // --- 3. Assert ---
    let listed = result_of(listed).await?;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    assert_eq!(listed[0]["id"], f.user.id.as_str());
    assert_eq!(bad_action.status(), StatusCode::BAD_REQUEST);

    let user = result_of(approved).await?;
    assert_eq!(user["role"], "CONGTACVIEN");
    assert_eq!(user["wants_collaborator"], false);
    assert_eq!(second_decision.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        f.app
            .setup()
            .count_rows("notifications", Some(("recipient_id", &f.user.id)))
            .await?,
        1
    );
    Ok(())
}

#[tokio::test]
async fn test_statistics_reflect_activity() -> Result<()> {
    // --- 1. Arrange ---
    let f = admin_fixture().await?;
    let id = pending_submission(&f, 35).await?;
    pending_submission(&f, 10).await?;
    f.app
        .client
        .post(f.app.url(&format!("/api/admin/submissions/{id}/action")))
        .bearer_auth(&f.admin_token)
        .json(&json!({"action": "approve"}))
        .send()
        .await?;
    f.app.setup().seed_voucher("Phiếu", 10, 3, None).await?;

    // --- 2. Act ---
    let stats = f
        .app
        .client
        .get(f.app.url("/api/admin/statistics"))
        .bearer_auth(&f.admin_token)
        .send()
        .await?;
    let review_stats = f
        .app
        .client
        .get(f.app.url("/api/submission-approval/statistics/overview"))
        .bearer_auth(&f.admin_token)
        .send()
        .await?;

    // --- 3. Assert ---
    let stats = result_of(stats).await?;
    assert_eq!(stats["submissions"]["total"], 2);
    assert_eq!(stats["submissions"]["pending"], 1);
    assert_eq!(stats["submissions"]["approved"], 1);
    assert_eq!(stats["users"]["total"], 2);
    assert_eq!(stats["users"]["admins"], 1);
    assert_eq!(stats["points"]["total_awarded"], 30);
    assert_eq!(stats["vouchers"]["active"], 1);
    assert_eq!(stats["vouchers"]["total_remaining"], 3);
    assert_eq!(review_stats.status(), StatusCode::OK);
    Ok(())
}
