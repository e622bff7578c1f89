// ABOUTME: Integration tests for the quota limiter and token usage history
// ABOUTME: Covers lazy initialization, clamped consumption, resets, grants, and totals

// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use conversation_cache::config::{DatabaseUrl, QuotaConfig, StorageConfig};
use conversation_cache::errors::ErrorCode;
use conversation_cache::quota::{Quota, QuotaLimiter, QuotaSubject, TokenUsageHistory};
use uuid::Uuid;

fn test_config() -> StorageConfig {
    StorageConfig {
        url: DatabaseUrl::Memory,
        ..StorageConfig::default()
    }
}

async fn create_test_limiter(initial_quota: i64, increase_by: i64) -> Quota {
    let quota = QuotaConfig {
        initial_quota,
        increase_by,
    };
    Quota::new(&test_config(), quota, QuotaSubject::User)
        .await
        .unwrap()
}

fn subject_id() -> String {
    Uuid::new_v4().to_string()
}

#[tokio::test]
async fn test_first_read_initializes_budget() {
    let limiter = create_test_limiter(100, 10).await;
    let subject = subject_id();

    assert_eq!(limiter.available_quota(&subject).await.unwrap(), 100);
    // a second read sees the stored record, not a fresh grant
    limiter.consume_tokens(30, 0, &subject).await.unwrap();
    assert_eq!(limiter.available_quota(&subject).await.unwrap(), 70);
}

#[tokio::test]
async fn test_consume_decrements_by_combined_tokens() {
    let limiter = create_test_limiter(100, 10).await;
    let subject = subject_id();

    limiter.consume_tokens(12, 8, &subject).await.unwrap();
    assert_eq!(limiter.available_quota(&subject).await.unwrap(), 80);

    limiter.consume_tokens(0, 80, &subject).await.unwrap();
    assert_eq!(limiter.available_quota(&subject).await.unwrap(), 0);
}

#[tokio::test]
async fn test_consume_clamps_at_zero() {
    let limiter = create_test_limiter(50, 10).await;
    let subject = subject_id();

    limiter.consume_tokens(40, 40, &subject).await.unwrap();
    assert_eq!(limiter.available_quota(&subject).await.unwrap(), 0);

    // further consumption keeps the budget at zero, never negative
    limiter.consume_tokens(100, 100, &subject).await.unwrap();
    assert_eq!(limiter.available_quota(&subject).await.unwrap(), 0);
}

#[tokio::test]
async fn test_consume_without_record_initializes_first() {
    let limiter = create_test_limiter(100, 10).await;
    let subject = subject_id();

    limiter.consume_tokens(25, 25, &subject).await.unwrap();
    assert_eq!(limiter.available_quota(&subject).await.unwrap(), 50);
}

#[tokio::test]
async fn test_ensure_available_quota() {
    let limiter = create_test_limiter(10, 5).await;
    let subject = subject_id();

    limiter.ensure_available_quota(&subject).await.unwrap();

    limiter.consume_tokens(10, 0, &subject).await.unwrap();
    let err = limiter.ensure_available_quota(&subject).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::QuotaExceeded);
    assert_eq!(err.http_status(), 429);
}

#[tokio::test]
async fn test_revoke_restores_budget_to_limit() {
    let limiter = create_test_limiter(100, 10).await;
    let subject = subject_id();

    limiter.consume_tokens(90, 10, &subject).await.unwrap();
    assert_eq!(limiter.available_quota(&subject).await.unwrap(), 0);

    limiter.revoke_quota(&subject).await.unwrap();
    assert_eq!(limiter.available_quota(&subject).await.unwrap(), 100);
}

#[tokio::test]
async fn test_revoke_without_record_initializes_first() {
    let limiter = create_test_limiter(100, 10).await;
    let subject = subject_id();

    limiter.revoke_quota(&subject).await.unwrap();
    assert_eq!(limiter.available_quota(&subject).await.unwrap(), 100);
}

#[tokio::test]
async fn test_increase_adds_configured_grant() {
    let limiter = create_test_limiter(100, 25).await;
    let subject = subject_id();

    limiter.increase_quota(&subject).await.unwrap();
    assert_eq!(limiter.available_quota(&subject).await.unwrap(), 125);

    // grants can lift an exhausted subject back above zero
    limiter.consume_tokens(125, 0, &subject).await.unwrap();
    limiter.increase_quota(&subject).await.unwrap();
    assert_eq!(limiter.available_quota(&subject).await.unwrap(), 25);
    limiter.ensure_available_quota(&subject).await.unwrap();
}

#[tokio::test]
async fn test_subjects_are_independent() {
    let limiter = create_test_limiter(100, 10).await;
    let first = subject_id();
    let second = subject_id();

    limiter.consume_tokens(100, 0, &first).await.unwrap();

    assert_eq!(limiter.available_quota(&first).await.unwrap(), 0);
    assert_eq!(limiter.available_quota(&second).await.unwrap(), 100);
}

#[tokio::test]
async fn test_usage_history_accumulates_totals() {
    let history = TokenUsageHistory::new(&test_config()).await.unwrap();
    let user = subject_id();

    assert!(history
        .usage_totals(&user, "openai", "gpt-4o")
        .await
        .unwrap()
        .is_none());

    history
        .record_usage(&user, "openai", "gpt-4o", 120, 40)
        .await
        .unwrap();
    history
        .record_usage(&user, "openai", "gpt-4o", 30, 10)
        .await
        .unwrap();

    assert_eq!(
        history.usage_totals(&user, "openai", "gpt-4o").await.unwrap(),
        Some((150, 50))
    );
}

#[tokio::test]
async fn test_usage_history_keys_on_provider_and_model() {
    let history = TokenUsageHistory::new(&test_config()).await.unwrap();
    let user = subject_id();

    history
        .record_usage(&user, "openai", "gpt-4o", 100, 50)
        .await
        .unwrap();
    history
        .record_usage(&user, "watsonx", "granite", 7, 3)
        .await
        .unwrap();

    assert_eq!(
        history.usage_totals(&user, "openai", "gpt-4o").await.unwrap(),
        Some((100, 50))
    );
    assert_eq!(
        history.usage_totals(&user, "watsonx", "granite").await.unwrap(),
        Some((7, 3))
    );
    assert!(history
        .usage_totals(&user, "openai", "granite")
        .await
        .unwrap()
        .is_none());

    assert!(history.connected().await);
}
