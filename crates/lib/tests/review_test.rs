//! # Review State Machine Tests
//!
//! Verifies that reviewer transitions move status, classification, points,
//! ledger and notification together, and that nothing moves when they fail.

mod common;

use anyhow::Result;
use common::World;
use core_access::Role;
use medreturn::{
    classification::{self, ClassificationEntry},
    errors::DomainError,
    notifications, points,
    review::{self, ApprovalDecision, ReviewRequest},
    submissions,
};

fn action(tag: &str) -> ReviewRequest {
    ReviewRequest {
        action: tag.to_string(),
        points_system: None,
        points: None,
        note: None,
        classifications: Vec::new(),
    }
}

fn entry(criterion_id: &str, outcome: &str) -> ClassificationEntry {
    ClassificationEntry {
        criterion_id: Some(criterion_id.to_string()),
        outcome: outcome.to_string(),
        measured_value: None,
        evidence_url: None,
        note: None,
    }
}

#[tokio::test]
async fn test_approval_credits_points_and_writes_one_ledger_row() -> Result<()> {
    // --- 1. Arrange ---
    let world = World::new().await?;
    let submission = world.submit(35).await?;
    let before = world.setup.balance(&world.submitter.id).await?;

    // --- 2. Act ---
    let outcome = review::apply_review_action(
        &world.setup.store,
        &world.admin,
        &submission.id,
        &action("approve"),
    )
    .await?;

    // --- 3. Assert ---
    assert_eq!(outcome.status.as_str(), "approved");
    assert_eq!(outcome.points_awarded, 30);
    assert_eq!(world.setup.balance(&world.submitter.id).await?, before + 30);

    let conn = world.setup.store.read().await?;
    let stored = submissions::get_submission(&conn, &submission.id).await?;
    assert_eq!(stored.status, "approved");
    assert_eq!(stored.points_awarded, Some(30));

    let ledger = points::ledger_for_user(&conn, &world.submitter.id).await?;
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].amount, 30);
    assert_eq!(
        ledger[0].reason,
        format!("Nộp thuốc thành công - Hồ sơ #{} (system)", &submission.id[..8])
    );
    assert!(points::reconcile(&conn, &world.submitter.id).await?.is_consistent());

    let inbox = notifications::list_for_recipient(&conn, &world.submitter.id).await?;
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, "SUBMISSION");
    assert_eq!(inbox[0].sender_id.as_deref(), Some(world.admin.id.as_str()));
    assert_eq!(
        inbox[0].body,
        "Hồ sơ nộp thuốc của bạn đã được duyệt. Bạn nhận được 30 điểm!"
    );
    Ok(())
}

#[tokio::test]
async fn test_pharmacy_rule_and_override() -> Result<()> {
    // --- 1. Arrange ---
    let world = World::new().await?;
    let small = world.submit(5).await?;
    let overridden = world.submit(35).await?;

    // --- 2. Act ---
    let mut pharmacy = action("approve");
    pharmacy.points_system = Some("pharmacy".to_string());
    let first =
        review::apply_review_action(&world.setup.store, &world.admin, &small.id, &pharmacy)
            .await?;

    let mut manual = action("approve");
    manual.points = Some(0);
    let second =
        review::apply_review_action(&world.setup.store, &world.admin, &overridden.id, &manual)
            .await?;

    // --- 3. Assert ---
    assert_eq!(first.points_awarded, 15);
    assert_eq!(second.points_awarded, 0);
    assert_eq!(world.setup.balance(&world.submitter.id).await?, 15);
    Ok(())
}

#[tokio::test]
async fn test_closed_submission_cannot_transition_again() -> Result<()> {
    // --- 1. Arrange ---
    let world = World::new().await?;
    let submission = world.submit(20).await?;
    review::apply_review_action(&world.setup.store, &world.admin, &submission.id, &action("approve"))
        .await?;

    // --- 2. Act ---
    let again = review::apply_review_action(
        &world.setup.store,
        &world.admin,
        &submission.id,
        &action("approve"),
    )
    .await;
    let recall = review::apply_review_action(
        &world.setup.store,
        &world.admin,
        &submission.id,
        &action("recall"),
    )
    .await;

    // --- 3. Assert ---
    assert!(matches!(again, Err(DomainError::Conflict(_))));
    assert!(matches!(recall, Err(DomainError::Conflict(_))));
    assert_eq!(world.setup.balance(&world.submitter.id).await?, 20);
    assert_eq!(
        world
            .setup
            .count_rows("point_ledger", Some(("user_id", &world.submitter.id)))
            .await?,
        1
    );
    let conn = world.setup.store.read().await?;
    assert_eq!(
        submissions::get_submission(&conn, &submission.id).await?.status,
        "approved"
    );
    Ok(())
}

#[tokio::test]
async fn test_unknown_action_and_unknown_submission() -> Result<()> {
    // --- 1. Arrange ---
    let world = World::new().await?;
    let submission = world.submit(10).await?;

    // --- 2. Act ---
    let bad_tag = review::apply_review_action(
        &world.setup.store,
        &world.admin,
        &submission.id,
        &action("archive"),
    )
    .await;
    let missing = review::apply_review_action(
        &world.setup.store,
        &world.admin,
        "no-such-submission",
        &action("archive"),
    )
    .await;

    // --- 3. Assert ---
    assert!(matches!(bad_tag, Err(DomainError::InvalidInput(_))));
    assert!(matches!(missing, Err(DomainError::NotFound(_))));
    let conn = world.setup.store.read().await?;
    assert_eq!(
        submissions::get_submission(&conn, &submission.id).await?.status,
        "pending"
    );
    Ok(())
}

#[tokio::test]
async fn test_rejection_uses_default_reason_and_awards_nothing() -> Result<()> {
    // --- 1. Arrange ---
    let world = World::new().await?;
    let submission = world.submit(50).await?;

    // --- 2. Act ---
    let outcome = review::apply_review_action(
        &world.setup.store,
        &world.admin,
        &submission.id,
        &action("reject"),
    )
    .await?;

    // --- 3. Assert ---
    assert_eq!(outcome.points_awarded, 0);
    assert_eq!(world.setup.balance(&world.submitter.id).await?, 0);
    let conn = world.setup.store.read().await?;
    let inbox = notifications::list_for_recipient(&conn, &world.submitter.id).await?;
    assert_eq!(
        inbox[0].body,
        "Hồ sơ nộp thuốc của bạn đã bị từ chối. Lý do: Không đạt tiêu chuẩn"
    );
    assert_eq!(
        submissions::get_submission(&conn, &submission.id).await?.points_awarded,
        None
    );
    Ok(())
}

#[tokio::test]
async fn test_failed_classification_rolls_back_the_whole_transition() -> Result<()> {
    // --- 1. Arrange ---
    let world = World::new().await?;
    let submission = world.submit(30).await?;
    let mut request = action("approve");
    request.classifications = vec![entry("missing-criterion", "DAT")];

    // --- 2. Act ---
    let result =
        review::apply_review_action(&world.setup.store, &world.admin, &submission.id, &request)
            .await;

    // --- 3. Assert ---
    assert!(matches!(result, Err(DomainError::NotFound(_))));
    assert_eq!(world.setup.balance(&world.submitter.id).await?, 0);
    assert_eq!(world.setup.count_rows("point_ledger", None).await?, 0);
    let conn = world.setup.store.read().await?;
    assert_eq!(
        submissions::get_submission(&conn, &submission.id).await?.status,
        "pending"
    );
    assert!(notifications::list_for_recipient(&conn, &world.submitter.id)
        .await?
        .is_empty());
    Ok(())
}

#[tokio::test]
async fn test_queue_approval_replaces_classification_instead_of_accumulating() -> Result<()> {
    // --- 1. Arrange ---
    let world = World::new().await?;
    let collaborator = world.setup.seed_user("Cộng Tác", Role::Collaborator).await?;
    let c1 = world.setup.seed_criterion("TC01", "Bao bì nguyên vẹn").await?;
    let c2 = world.setup.seed_criterion("TC02", "Còn hạn sử dụng").await?;
    let c3 = world.setup.seed_criterion("TC03", "Nhãn rõ ràng").await?;
    let submission = world.submit(35).await?;
    let entries = vec![
        entry(&c1.id, "DAT"),
        entry(&c2.id, "DAT"),
        entry(&c3.id, "XEM_XET"),
    ];

    // --- 2. Act ---
    review::classify_submission(
        &world.setup.store,
        &collaborator,
        &submission.id,
        &entries,
        None,
        None,
    )
        .await?;
    let decision = ApprovalDecision {
        decision: "approved".to_string(),
        note: None,
        classifications: entries.clone(),
    };
    let outcome =
        review::approve_pending(&world.setup.store, &collaborator, &submission.id, &decision)
            .await?;

    // --- 3. Assert ---
    assert_eq!(outcome.points_awarded, 30);
    let result = outcome.classification.expect("classification written");
    assert_eq!(result.overall, "XEM_XET");
    assert_eq!(result.details.len(), 3);
    assert_eq!(world.setup.count_rows("classification_results", None).await?, 1);
    assert_eq!(world.setup.count_rows("classification_details", None).await?, 3);
    let conn = world.setup.store.read().await?;
    assert_eq!(classification::detail_count(&conn, &submission.id).await?, 3);
    Ok(())
}

#[tokio::test]
async fn test_queue_decision_accepts_only_approved_or_rejected() -> Result<()> {
    // --- 1. Arrange ---
    let world = World::new().await?;
    let submission = world.submit(10).await?;
    let decision = ApprovalDecision {
        decision: "recalled".to_string(),
        note: None,
        classifications: Vec::new(),
    };

    // --- 2. Act ---
    let result =
        review::approve_pending(&world.setup.store, &world.admin, &submission.id, &decision).await;
    let by_user =
        review::approve_pending(&world.setup.store, &world.submitter, &submission.id, &decision)
            .await;

    // --- 3. Assert ---
    assert!(matches!(result, Err(DomainError::Validation(_))));
    assert!(matches!(by_user, Err(DomainError::Forbidden(_))));
    Ok(())
}

#[tokio::test]
async fn test_detail_loads_only_the_requested_submission() -> Result<()> {
    // --- 1. Arrange ---
    let world = World::new().await?;
    let first = world.submit(10).await?;
    let second = world.submit(40).await?;

    // --- 2. Act ---
    let conn = world.setup.store.read().await?;
    let detail = review::submission_detail(&conn, &first.id).await?;
    let missing = review::submission_detail(&conn, "no-such-submission").await;

    // --- 3. Assert ---
    assert_eq!(detail.submission.submission.id, first.id);
    assert_ne!(detail.submission.submission.id, second.id);
    assert_eq!(detail.submission.submission.quantity, 10);
    assert_eq!(detail.submission.pharmacy_name.as_deref(), Some("Nhà thuốc An Khang"));
    assert_eq!(detail.submission.active_ingredient.as_deref(), Some("Paracetamol"));
    assert!(detail.classification.is_none());
    assert!(matches!(missing, Err(DomainError::NotFound(_))));
    Ok(())
}
