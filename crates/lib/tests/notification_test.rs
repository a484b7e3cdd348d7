//! # Notification Tests

mod common;

use anyhow::Result;
use core_access::Role;
use medreturn::{
    errors::DomainError,
    notifications::{self, OutgoingNotification},
    types::NotificationKind,
};
use medreturn_test_utils::TestSetup;

#[tokio::test]
async fn test_broadcast_reaches_everyone_or_known_targets() -> Result<()> {
    // --- 1. Arrange ---
    let setup = TestSetup::new().await?;
    let admin = setup.seed_user("Admin", Role::Admin).await?;
    let a = setup.seed_user("Người A", Role::User).await?;
    let b = setup.seed_user("Người B", Role::User).await?;
    let notice = OutgoingNotification::from_sender(
        admin.id.clone(),
        NotificationKind::System,
        "Hệ thống bảo trì lúc 22h",
    );

    // --- 2. Act ---
    let everyone = notifications::broadcast(&setup.store, None, &notice).await?;
    let targets = vec![a.id.clone(), "ghost".to_string()];
    let some = notifications::broadcast(&setup.store, Some(&targets), &notice).await?;

    // --- 3. Assert ---
    assert_eq!(everyone, 3);
    assert_eq!(some, 1, "unknown recipients are skipped");
    assert_eq!(setup.count_rows("notifications", Some(("recipient_id", &a.id))).await?, 2);
    assert_eq!(setup.count_rows("notifications", Some(("recipient_id", &b.id))).await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_broadcast_rejects_forum_kinds_and_blank_bodies() -> Result<()> {
    // --- 1. Arrange ---
    let setup = TestSetup::new().await?;
    setup.seed_user("Người A", Role::User).await?;

    // --- 2. Act ---
    let forum = notifications::broadcast(
        &setup.store,
        None,
        &OutgoingNotification::system(NotificationKind::Forum, "Bài viết mới"),
    )
    .await;
    let blank = notifications::broadcast(
        &setup.store,
        None,
        &OutgoingNotification::system(NotificationKind::User, "   "),
    )
    .await;

    // --- 3. Assert ---
    assert!(matches!(forum, Err(DomainError::Validation(_))));
    assert!(matches!(blank, Err(DomainError::Validation(_))));
    assert_eq!(setup.count_rows("notifications", None).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_direct_message_to_unknown_user_is_not_found() -> Result<()> {
    // --- 1. Arrange ---
    let setup = TestSetup::new().await?;
    let notice = OutgoingNotification::system(NotificationKind::User, "Xin chào");

    // --- 2. Act ---
    let result = notifications::send_to_user(&setup.store, "ghost", &notice).await;

    // --- 3. Assert ---
    assert!(matches!(result, Err(DomainError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn test_recipient_inbox_operations() -> Result<()> {
    // --- 1. Arrange ---
    let setup = TestSetup::new().await?;
    let user = setup.seed_user("Người A", Role::User).await?;
    let other = setup.seed_user("Người B", Role::User).await?;
    let mut ids = Vec::new();
    for body in ["Một", "Hai", "Ba"] {
        let notice = OutgoingNotification::system(NotificationKind::System, body);
        ids.push(notifications::send_to_user(&setup.store, &user.id, &notice).await?);
    }

    // --- 2. Act & 3. Assert ---
    let tx = setup.store.write().await?;
    assert_eq!(notifications::unread_count(&tx, &user.id).await?, 3);

    notifications::mark_read(&tx, &user.id, &ids[0]).await?;
    assert_eq!(notifications::unread_count(&tx, &user.id).await?, 2);

    let foreign = notifications::mark_read(&tx, &other.id, &ids[1]).await;
    assert!(matches!(foreign, Err(DomainError::NotFound(_))));

    assert_eq!(notifications::clear_read(&tx, &user.id).await?, 1);
    assert_eq!(notifications::mark_all_read(&tx, &user.id).await?, 2);
    assert_eq!(notifications::unread_count(&tx, &user.id).await?, 0);

    notifications::delete(&tx, &user.id, &ids[2]).await?;
    let remaining = notifications::list_for_recipient(&tx, &user.id).await?;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, ids[1]);
    tx.commit().await?;
    Ok(())
}
