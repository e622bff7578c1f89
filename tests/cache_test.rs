// ABOUTME: Integration tests for the conversation cache over sqlite::memory:
// ABOUTME: Covers append ordering, eviction, deletion, listing, and validation gating
//
// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use conversation_cache::cache::sqlite::SqliteCache;
use conversation_cache::cache::{Cache, ConversationCache};
use conversation_cache::config::{DatabaseUrl, StorageConfig};
use conversation_cache::errors::ErrorCode;
use conversation_cache::models::{CacheEntry, MessageRole};
use std::time::Duration;
use uuid::Uuid;

fn test_config(max_entries: i64) -> StorageConfig {
    StorageConfig {
        url: DatabaseUrl::Memory,
        max_entries,
        ..StorageConfig::default()
    }
}

/// Create an isolated in-memory cache instance
async fn create_test_cache(capacity: i64) -> Cache {
    Cache::new(&test_config(capacity)).await.unwrap()
}

fn suid() -> String {
    Uuid::new_v4().to_string()
}

fn human(content: &str) -> CacheEntry {
    CacheEntry::new(MessageRole::Human, content)
}

fn assistant(content: &str) -> CacheEntry {
    CacheEntry::new(MessageRole::Assistant, content)
}

/// Timestamps order eviction and listing; keep successive writes strictly
/// ordered in time
async fn tick() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

#[tokio::test]
async fn test_get_missing_conversation_returns_empty() {
    let cache = create_test_cache(10).await;
    let history = cache.get(&suid(), &suid(), false).await.unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_append_ordering_preserved() {
    let cache = create_test_cache(10).await;
    let user = suid();
    let conversation = suid();

    for i in 0..6 {
        let entry = if i % 2 == 0 {
            human(&format!("question {i}"))
        } else {
            assistant(&format!("answer {i}"))
        };
        cache
            .insert_or_append(&user, &conversation, entry, "", false)
            .await
            .unwrap();
    }

    let history = cache.get(&user, &conversation, false).await.unwrap();
    assert_eq!(history.len(), 6);
    for (i, entry) in history.iter().enumerate() {
        assert!(entry.content.ends_with(&i.to_string()));
        let expected = if i % 2 == 0 {
            MessageRole::Human
        } else {
            MessageRole::Assistant
        };
        assert_eq!(entry.role, expected);
    }
}

#[tokio::test]
async fn test_capacity_evicts_globally_oldest() {
    let cache = create_test_cache(3).await;
    let user = suid();
    let conversations: Vec<String> = (0..5).map(|_| suid()).collect();

    for (i, conversation) in conversations.iter().enumerate() {
        cache
            .insert_or_append(&user, conversation, human(&format!("turn {i}")), "", false)
            .await
            .unwrap();
        tick().await;
    }

    // A and B (oldest two) are gone, C, D, E survive
    for evicted in &conversations[..2] {
        assert!(cache.get(&user, evicted, false).await.unwrap().is_empty());
    }
    for surviving in &conversations[2..] {
        assert_eq!(cache.get(&user, surviving, false).await.unwrap().len(), 1);
    }
    assert_eq!(cache.list(&user, false).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_append_refreshes_timestamp_and_protects_from_eviction() {
    let cache = create_test_cache(2).await;
    let user = suid();
    let a = suid();
    let b = suid();
    let c = suid();
    let d = suid();

    for conversation in [&a, &b, &c] {
        cache
            .insert_or_append(&user, conversation, human("hello"), "", false)
            .await
            .unwrap();
        tick().await;
    }
    // capacity 2: A evicted, {B, C} remain with B oldest
    assert!(cache.get(&user, &a, false).await.unwrap().is_empty());

    cache
        .insert_or_append(&user, &b, assistant("hi again"), "", false)
        .await
        .unwrap();
    tick().await;

    cache
        .insert_or_append(&user, &d, human("new topic"), "", false)
        .await
        .unwrap();

    // the just-appended B survives over the untouched C
    assert_eq!(cache.get(&user, &b, false).await.unwrap().len(), 2);
    assert!(cache.get(&user, &c, false).await.unwrap().is_empty());
    assert_eq!(cache.get(&user, &d, false).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_zero_capacity_evicts_every_insert() {
    let cache = create_test_cache(0).await;
    let user = suid();
    let conversation = suid();

    cache
        .insert_or_append(&user, &conversation, human("hello"), "", false)
        .await
        .unwrap();

    assert!(cache.get(&user, &conversation, false).await.unwrap().is_empty());
    assert!(cache.list(&user, false).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_appends_do_not_trigger_eviction() {
    let cache = create_test_cache(2).await;
    let user = suid();
    let a = suid();
    let b = suid();

    cache
        .insert_or_append(&user, &a, human("first"), "", false)
        .await
        .unwrap();
    tick().await;
    cache
        .insert_or_append(&user, &b, human("second"), "", false)
        .await
        .unwrap();
    tick().await;

    // appends never grow the record count, both records stay
    for i in 0..10 {
        cache
            .insert_or_append(&user, &a, assistant(&format!("turn {i}")), "", false)
            .await
            .unwrap();
    }
    assert_eq!(cache.get(&user, &a, false).await.unwrap().len(), 11);
    assert_eq!(cache.get(&user, &b, false).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_reports_existence() {
    let cache = create_test_cache(10).await;
    let user = suid();
    let conversation = suid();

    assert!(!cache.delete(&user, &conversation, false).await.unwrap());

    cache
        .insert_or_append(&user, &conversation, human("hello"), "", false)
        .await
        .unwrap();

    assert!(cache.delete(&user, &conversation, false).await.unwrap());
    assert!(cache.get(&user, &conversation, false).await.unwrap().is_empty());
    assert!(!cache.delete(&user, &conversation, false).await.unwrap());
}

#[tokio::test]
async fn test_list_orders_most_recent_first() {
    let cache = create_test_cache(10).await;
    let user = suid();
    let x = suid();
    let y = suid();

    cache
        .insert_or_append(&user, &x, human("older"), "topic x", false)
        .await
        .unwrap();
    tick().await;
    cache
        .insert_or_append(&user, &y, human("newer"), "topic y", false)
        .await
        .unwrap();

    let listed = cache.list(&user, false).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].conversation_id, y);
    assert_eq!(listed[0].topic_summary, "topic y");
    assert_eq!(listed[1].conversation_id, x);

    // appending to X makes it the most recent again
    tick().await;
    cache
        .insert_or_append(&user, &x, assistant("follow-up"), "", false)
        .await
        .unwrap();
    let listed = cache.list(&user, false).await.unwrap();
    assert_eq!(listed[0].conversation_id, x);
}

#[tokio::test]
async fn test_list_is_scoped_to_user() {
    let cache = create_test_cache(10).await;
    let alice = suid();
    let bob = suid();

    cache
        .insert_or_append(&alice, &suid(), human("hers"), "", false)
        .await
        .unwrap();
    cache
        .insert_or_append(&bob, &suid(), human("his"), "", false)
        .await
        .unwrap();

    assert_eq!(cache.list(&alice, false).await.unwrap().len(), 1);
    assert_eq!(cache.list(&bob, false).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_topic_summary_set_at_creation_never_mutates() {
    let cache = create_test_cache(10).await;
    let user = suid();
    let conversation = suid();

    cache
        .insert_or_append(&user, &conversation, human("hello"), "original topic", false)
        .await
        .unwrap();
    cache
        .insert_or_append(&user, &conversation, assistant("reply"), "other topic", false)
        .await
        .unwrap();

    let listed = cache.list(&user, false).await.unwrap();
    assert_eq!(listed[0].topic_summary, "original topic");
}

#[tokio::test]
async fn test_invalid_identifiers_rejected_before_io() {
    let config = test_config(10);
    let cache = SqliteCache::new(&config).await.unwrap();

    // With storage torn down only validation can answer; a storage error
    // here would mean a backend call was attempted first
    cache.pool().close().await;

    let err = cache.get("not-a-uuid", &suid(), false).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidIdentifier);

    let err = cache
        .insert_or_append(&suid(), "not-a-uuid", human("hello"), "", false)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidIdentifier);

    // Valid identifiers reach the backend and surface the storage failure
    let err = cache.get(&suid(), &suid(), false).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::StorageError);
}

#[tokio::test]
async fn test_skip_user_id_check_allows_opaque_user_ids() {
    let cache = create_test_cache(10).await;
    let conversation = suid();

    cache
        .insert_or_append("cluster-admin", &conversation, human("hello"), "", true)
        .await
        .unwrap();
    assert_eq!(
        cache.get("cluster-admin", &conversation, true).await.unwrap().len(),
        1
    );

    // conversation_id is validated regardless
    let err = cache
        .get("cluster-admin", "not-a-uuid", true)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidIdentifier);
}

#[tokio::test]
async fn test_connectivity_probes() {
    let config = test_config(10);
    let cache = SqliteCache::new(&config).await.unwrap();

    assert!(cache.ready());
    assert!(cache.connected().await);

    cache.pool().close().await;
    assert!(!cache.ready());
    assert!(!cache.connected().await);
}

#[tokio::test]
async fn test_concurrent_appends_to_same_key_all_land() {
    let cache = std::sync::Arc::new(create_test_cache(10).await);
    let user = suid();
    let conversation = suid();

    let mut handles = Vec::new();
    for i in 0..8 {
        let cache = std::sync::Arc::clone(&cache);
        let user = user.clone();
        let conversation = conversation.clone();
        handles.push(tokio::spawn(async move {
            cache
                .insert_or_append(&user, &conversation, human(&format!("turn {i}")), "", false)
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let history = cache.get(&user, &conversation, false).await.unwrap();
    assert_eq!(history.len(), 8);
}

#[tokio::test]
async fn test_concurrent_appends_on_file_backed_pool_all_land() {
    // A file-backed pool hands each writer its own connection, so the
    // appends genuinely race instead of queueing on a single connection
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        url: DatabaseUrl::SQLite {
            path: dir.path().join("cache.db"),
        },
        max_entries: 50,
        ..StorageConfig::default()
    };
    let cache = std::sync::Arc::new(Cache::new(&config).await.unwrap());
    let user = suid();
    let conversation = suid();

    let mut handles = Vec::new();
    for i in 0..16 {
        let cache = std::sync::Arc::clone(&cache);
        let user = user.clone();
        let conversation = conversation.clone();
        handles.push(tokio::spawn(async move {
            cache
                .insert_or_append(&user, &conversation, human(&format!("turn {i}")), "", false)
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let history = cache.get(&user, &conversation, false).await.unwrap();
    assert_eq!(history.len(), 16);
}
