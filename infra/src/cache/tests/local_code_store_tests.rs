//! Unit tests for the in-memory code store

use std::sync::Arc;
use std::time::Duration;

use otp_core::domain::entities::verification_code::IssuePolicy;
use otp_core::errors::CodeError;
use otp_core::services::CodeStore;

use crate::cache::LocalCodeStore;

const PHONE: &str = "13800000000";

fn store() -> LocalCodeStore {
    LocalCodeStore::new(IssuePolicy::default(), "phone_code", 16)
}

#[tokio::test]
async fn test_set_then_verify_scenario() {
    let store = store();

    store.set("login", PHONE, "1234").await.unwrap();
    assert_eq!(store.remaining_attempts("login", PHONE), Some(3));

    let result = store.verify("login", PHONE, "0000").await;
    assert_eq!(result, Err(CodeError::VerifyFailed));
    assert_eq!(store.remaining_attempts("login", PHONE), Some(2));

    store.verify("login", PHONE, "1234").await.unwrap();
}

#[tokio::test]
async fn test_immediate_resend_is_rejected() {
    let store = store();

    store.set("login", PHONE, "1234").await.unwrap();
    let result = store.set("login", PHONE, "5678").await;
    assert_eq!(result, Err(CodeError::SendTooMany));

    // The stored code is unchanged
    store.verify("login", PHONE, "1234").await.unwrap();
}

#[tokio::test]
async fn test_three_mismatches_exhaust_attempts() {
    let store = store();
    store.set("login", PHONE, "1234").await.unwrap();

    for _ in 0..3 {
        assert_eq!(
            store.verify("login", PHONE, "9999").await,
            Err(CodeError::VerifyFailed)
        );
    }
    assert_eq!(store.remaining_attempts("login", PHONE), Some(0));
    assert_eq!(
        store.verify("login", PHONE, "1234").await,
        Err(CodeError::VerifyTooManyTimes)
    );
    // Exhaustion does not mutate the record
    assert_eq!(store.remaining_attempts("login", PHONE), Some(0));
}

#[tokio::test]
async fn test_successful_verify_deletes_record() {
    let store = store();
    store.set("login", PHONE, "1234").await.unwrap();

    store.verify("login", PHONE, "1234").await.unwrap();

    assert_eq!(
        store.verify("login", PHONE, "1234").await,
        Err(CodeError::Unknown)
    );
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_verify_without_record_is_unknown() {
    let store = store();
    assert_eq!(
        store.verify("login", PHONE, "1234").await,
        Err(CodeError::Unknown)
    );
}

#[tokio::test]
async fn test_keys_are_scoped_by_business() {
    let store = store();

    store.set("login", PHONE, "1234").await.unwrap();
    store.set("signup", PHONE, "5678").await.unwrap();

    assert_eq!(
        store.verify("login", PHONE, "5678").await,
        Err(CodeError::VerifyFailed)
    );
    store.verify("signup", PHONE, "5678").await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_resend_after_cooldown_resets_attempts() {
    let store = store();
    store.set("login", PHONE, "1234").await.unwrap();
    store.verify("login", PHONE, "0000").await.unwrap_err();
    assert_eq!(store.remaining_attempts("login", PHONE), Some(2));

    tokio::time::advance(Duration::from_secs(59)).await;
    assert_eq!(
        store.set("login", PHONE, "5678").await,
        Err(CodeError::SendTooMany)
    );

    tokio::time::advance(Duration::from_secs(1)).await;
    store.set("login", PHONE, "5678").await.unwrap();
    assert_eq!(store.remaining_attempts("login", PHONE), Some(3));

    // Old code no longer valid
    assert_eq!(
        store.verify("login", PHONE, "1234").await,
        Err(CodeError::VerifyFailed)
    );
    store.verify("login", PHONE, "5678").await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_record_expires_after_ttl() {
    let store = store();
    store.set("login", PHONE, "1234").await.unwrap();

    tokio::time::advance(Duration::from_secs(600)).await;

    assert_eq!(
        store.verify("login", PHONE, "1234").await,
        Err(CodeError::Unknown)
    );
    // Expired record does not block a new issue
    store.set("login", PHONE, "4321").await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_purge_expired_records() {
    let store = store();
    store.set("login", "13800000001", "1111").await.unwrap();
    store.set("login", "13800000002", "2222").await.unwrap();

    tokio::time::advance(Duration::from_secs(300)).await;
    store.set("login", "13800000003", "3333").await.unwrap();
    tokio::time::advance(Duration::from_secs(300)).await;

    assert_eq!(store.purge_expired(), 2);
    assert_eq!(store.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unverified_records_do_not_accumulate() {
    let store = LocalCodeStore::new(IssuePolicy::default(), "phone_code", 4);

    for round in 0..5 {
        for i in 0..100 {
            let phone = format!("1380000{}{:03}", round, i);
            store.set("login", &phone, "1234").await.unwrap();
        }
        assert_eq!(store.len(), 100);
        tokio::time::advance(Duration::from_secs(601)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_set_admits_exactly_one() {
    let store = Arc::new(store());

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move { store.set("login", PHONE, &format!("{:04}", i)).await })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => succeeded += 1,
            Err(e) => assert_eq!(e, CodeError::SendTooMany),
        }
    }
    assert_eq!(succeeded, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_verify_never_overspends_attempts() {
    let store = Arc::new(store());
    store.set("login", PHONE, "1234").await.unwrap();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.verify("login", PHONE, "9999").await })
        })
        .collect();

    let mut failed = 0;
    let mut exhausted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Err(CodeError::VerifyFailed) => failed += 1,
            Err(CodeError::VerifyTooManyTimes) => exhausted += 1,
            other => panic!("Unexpected result: {:?}", other),
        }
    }
    assert_eq!(failed, 3);
    assert_eq!(exhausted, 13);
}

#[test]
fn test_shard_count_is_at_least_one() {
    let store = LocalCodeStore::new(IssuePolicy::default(), "phone_code", 0);
    assert_eq!(store.shard_count(), 1);
}
