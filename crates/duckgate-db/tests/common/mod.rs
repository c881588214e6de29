// Backend-agnostic integration tests for the key store.
//
// Each public async function accepts a `KeyStore` so that the same logic
// can be exercised against both the SQLite and Postgres backends.

#![allow(dead_code)]

use std::collections::HashSet;

use duckgate_db::KeyStore;

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Create, list, validate and delete a single key.
pub async fn test_key_lifecycle(store: &KeyStore) {
    assert!(store.list_all().await.unwrap().is_empty());

    let key = store.create(Some("telegram bot")).await.unwrap();
    assert!(key.id.is_some());
    assert_eq!(key.key.len(), 32);
    assert_eq!(key.description.as_deref(), Some("telegram bot"));
    assert_eq!(key.usage_count, 0);
    assert!(key.last_used_at.is_none());

    let listed = store.list_all().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, key.id);
    assert_eq!(listed[0].key, key.key);

    // validate bumps usage
    assert!(store.validate(&key.key).await.unwrap());
    let listed = store.list_all().await.unwrap();
    assert_eq!(listed[0].usage_count, 1);
    let first_use = listed[0].last_used_at.expect("last_used_at set after validate");
    assert!(first_use >= key.created_at);

    // delete, then the key is gone
    assert!(store.delete(&key.key).await.unwrap());
    assert!(!store.validate(&key.key).await.unwrap());
    assert!(store.list_all().await.unwrap().is_empty());
}

/// Keys without a description round-trip as `None`.
pub async fn test_create_without_description(store: &KeyStore) {
    let key = store.create(None).await.unwrap();
    assert!(key.description.is_none());
    let listed = store.list_all().await.unwrap();
    assert!(listed[0].description.is_none());
}

/// Newest key first.
pub async fn test_list_order(store: &KeyStore) {
    let a = store.create(Some("a")).await.unwrap();
    let b = store.create(Some("b")).await.unwrap();
    let c = store.create(Some("c")).await.unwrap();

    let keys: Vec<String> = store
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|k| k.key)
        .collect();
    assert_eq!(keys, vec![c.key, b.key, a.key]);
}

// ---------------------------------------------------------------------------
// Misses
// ---------------------------------------------------------------------------

/// Unknown keys are rejected and leave existing rows untouched.
pub async fn test_validate_unknown(store: &KeyStore) {
    let key = store.create(None).await.unwrap();

    assert!(!store.validate("0000000000000000ffffffffffffffff").await.unwrap());
    assert!(!store.validate("").await.unwrap());

    let listed = store.list_all().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].key, key.key);
    assert_eq!(listed[0].usage_count, 0);
    assert!(listed[0].last_used_at.is_none());
}

/// Deleting an absent key is `false`, not an error.
pub async fn test_delete_missing(store: &KeyStore) {
    assert!(!store.delete("does-not-exist").await.unwrap());

    let key = store.create(None).await.unwrap();
    assert!(!store.delete(&key.key[..8]).await.unwrap());
    assert_eq!(store.list_all().await.unwrap().len(), 1);
}

/// Initialize twice keeps existing rows.
pub async fn test_initialize_idempotent(store: &KeyStore) {
    let key = store.create(None).await.unwrap();
    store.initialize().await.unwrap();
    store.initialize().await.unwrap();
    let listed = store.list_all().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].key, key.key);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

/// N concurrent validations of one key add exactly N.
pub async fn test_concurrent_validate(store: &KeyStore, n: usize) {
    let key = store.create(None).await.unwrap();

    let mut handles = Vec::with_capacity(n);
    for _ in 0..n {
        let store = store.clone();
        let raw = key.key.clone();
        handles.push(tokio::spawn(async move { store.validate(&raw).await }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().unwrap());
    }

    let listed = store.list_all().await.unwrap();
    assert_eq!(listed[0].usage_count, n as i64);
}

/// Keys created concurrently are all distinct and all persisted.
pub async fn test_concurrent_create(store: &KeyStore, n: usize) {
    let mut handles = Vec::with_capacity(n);
    for i in 0..n {
        let store = store.clone();
        let description = format!("key-{i}");
        handles.push(tokio::spawn(async move {
            store.create(Some(&description)).await
        }));
    }
    let mut created = HashSet::new();
    for handle in handles {
        let key = handle.await.unwrap().unwrap();
        assert!(created.insert(key.key));
    }

    let listed: HashSet<String> = store
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|k| k.key)
        .collect();
    assert_eq!(listed, created);
}
