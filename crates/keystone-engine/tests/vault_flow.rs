//! Locked value vault flows

mod common;

use common::*;
use futures::future::join_all;
use keystone_core::{KeystoneCoreError, LockId, LockOutcome, LockPurpose, LockStatus};
use keystone_engine::EngineError;

#[tokio::test]
async fn test_forfeit_then_refund_is_rejected() {
    let h = harness(test_config());
    let vault = &h.engine.vault;
    let alice = user("alice");

    vault.deposit(&alice, 100).await.unwrap();
    let lock_id = vault
        .lock(&alice, LockPurpose::RoomApplication, 30, "room-7")
        .await
        .unwrap();

    let account = vault.account(&alice).await.unwrap();
    assert_eq!((account.available, account.locked), (70, 30));

    let lock = vault.resolve(&lock_id, LockOutcome::Forfeit).await.unwrap();
    assert_eq!(lock.status, LockStatus::Forfeited);
    assert!(lock.resolved_at.is_some());

    let err = vault.resolve(&lock_id, LockOutcome::Refund).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Core(KeystoneCoreError::AlreadyResolved(LockStatus::Forfeited))
    ));

    let account = vault.account(&alice).await.unwrap();
    assert_eq!(account.available, 70);
    assert_eq!(account.locked, 0);
    assert_eq!(account.forfeited, 30);
}

#[tokio::test]
async fn test_refund_returns_value() {
    let h = harness(test_config());
    let vault = &h.engine.vault;
    let bob = user("bob");

    vault.deposit(&bob, 50).await.unwrap();
    let lock_id = vault.lock(&bob, LockPurpose::DmDeposit, 50, "thread-1").await.unwrap();
    assert_eq!(vault.account(&bob).await.unwrap().available, 0);

    vault.resolve(&lock_id, LockOutcome::Refund).await.unwrap();
    let account = vault.account(&bob).await.unwrap();
    assert_eq!((account.available, account.locked, account.forfeited), (50, 0, 0));
}

#[tokio::test]
async fn test_duplicate_open_lock_rejected() {
    let h = harness(test_config());
    let vault = &h.engine.vault;
    let alice = user("alice");

    vault.deposit(&alice, 100).await.unwrap();
    let first = vault.lock(&alice, LockPurpose::CuratorStake, 10, "round-3").await.unwrap();

    let err = vault
        .lock(&alice, LockPurpose::CuratorStake, 10, "round-3")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicateLock { .. }));
    assert_eq!(vault.account(&alice).await.unwrap().locked, 10);

    // Once the first lock resolves the key is free again
    vault.resolve(&first, LockOutcome::Refund).await.unwrap();
    vault.lock(&alice, LockPurpose::CuratorStake, 10, "round-3").await.unwrap();
}

#[tokio::test]
async fn test_lock_requires_available_balance() {
    let h = harness(test_config());
    let vault = &h.engine.vault;
    let alice = user("alice");

    let err = vault.lock(&alice, LockPurpose::DmDeposit, 1, "thread-9").await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Core(KeystoneCoreError::InsufficientBalance { available: 0, requested: 1 })
    ));

    let err = vault.lock(&alice, LockPurpose::DmDeposit, 0, "thread-9").await.unwrap_err();
    assert!(matches!(err, EngineError::Core(KeystoneCoreError::InvalidAmount)));
}

#[tokio::test]
async fn test_unknown_lock() {
    let h = harness(test_config());
    let missing = LockId::new();

    let err = h.engine.vault.resolve(&missing, LockOutcome::Refund).await.unwrap_err();
    assert!(matches!(err, EngineError::LockNotFound(id) if id == missing));
}

#[tokio::test]
async fn test_concurrent_locks_never_overdraw() {
    let h = harness(test_config());
    let vault = &h.engine.vault;
    let alice = user("alice");
    vault.deposit(&alice, 10).await.unwrap();

    let correlations: Vec<String> = (0..5).map(|i| format!("room-{i}")).collect();
    let results = join_all(
        correlations
            .iter()
            .map(|c| vault.lock(&alice, LockPurpose::RoomApplication, 3, c)),
    )
    .await;

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 3);
    for err in results.into_iter().filter_map(Result::err) {
        assert!(matches!(
            err,
            EngineError::Core(KeystoneCoreError::InsufficientBalance { available: 1, requested: 3 })
        ));
    }

    let account = vault.account(&alice).await.unwrap();
    assert_eq!((account.available, account.locked), (1, 9));
    assert_eq!(vault.locks_for_user(&alice, Some(LockStatus::Locked)).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_locks_by_correlation_and_status() {
    let h = harness(test_config());
    let vault = &h.engine.vault;

    for name in ["a", "b", "c"] {
        vault.deposit(&user(name), 20).await.unwrap();
        vault
            .lock(&user(name), LockPurpose::RoomApplication, 5, "room-42")
            .await
            .unwrap();
    }
    vault.lock(&user("a"), "custom".parse().unwrap(), 5, "elsewhere").await.unwrap();

    let room = vault.locks_for_correlation("room-42").await.unwrap();
    assert_eq!(room.len(), 3);
    assert!(room.iter().all(|l| l.purpose == LockPurpose::RoomApplication));

    let forfeited = room.iter().find(|l| l.user_id == user("b")).unwrap().id;
    vault.resolve(&forfeited, LockOutcome::Forfeit).await.unwrap();

    let open = vault.locks_for_user(&user("a"), Some(LockStatus::Locked)).await.unwrap();
    assert_eq!(open.len(), 2);
    assert!(open.iter().any(|l| l.purpose == LockPurpose::Other("custom".into())));
    assert!(vault
        .locks_for_user(&user("b"), Some(LockStatus::Locked))
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        vault
            .locks_for_user(&user("b"), Some(LockStatus::Forfeited))
            .await
            .unwrap()
            .len(),
        1
    );
}
