//! End-to-end memoization tests over the in-process store.

mod common;

use memora_cache::{function_id, CacheHandle, CallArgs, Kwargs, Memoized, Ttl};
use memora_core::MemoraError;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Profile {
    id: u64,
    name: String,
    tags: Vec<String>,
}

#[derive(Serialize)]
struct ProfileQuery {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<String>,
}

fn counting_lookup(
    handle: CacheHandle,
    calls: Arc<AtomicUsize>,
) -> Memoized<impl Fn((u64,)) -> futures::future::Ready<Result<Profile, MemoraError>>> {
    Memoized::new(function_id!("load_profile"), handle, move |(id,): (u64,)| {
        calls.fetch_add(1, Ordering::SeqCst);
        let result = if id == 0 {
            Err(MemoraError::not_found("profile", id))
        } else {
            Ok(Profile {
                id,
                name: format!("user-{}", id),
                tags: vec!["a".to_string(), "b".to_string()],
            })
        };
        futures::future::ready(result)
    })
}

#[tokio::test]
async fn test_struct_results_round_trip_through_cache() {
    let manager = common::memory_manager("").await;
    let calls = Arc::new(AtomicUsize::new(0));
    let lookup = counting_lookup(manager.handle(), calls.clone()).with_ttl(Ttl::from_secs(30));

    let first = lookup.call((7,)).await.expect("lookup failed");
    let second = lookup.call((7,)).await.expect("lookup failed");

    assert_eq!(first, second);
    assert_eq!(first.name, "user-7");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_not_found_is_propagated_and_not_cached() {
    let manager = common::memory_manager("").await;
    let calls = Arc::new(AtomicUsize::new(0));
    let lookup = counting_lookup(manager.handle(), calls.clone());

    for _ in 0..2 {
        let err = lookup.call((0,)).await.unwrap_err();
        assert!(matches!(err, MemoraError::NotFound { .. }));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!manager.store().unwrap().exists(lookup.key_for(&(0_u64,)).as_str()).await.unwrap());
}

#[tokio::test]
async fn test_store_prefix_does_not_change_wrapper_keys() {
    let manager = common::memory_manager("svc:").await;
    let calls = Arc::new(AtomicUsize::new(0));
    let lookup = counting_lookup(manager.handle(), calls.clone()).with_prefix("profiles:");

    lookup.call((3,)).await.unwrap();
    let key = lookup.key_for(&(3_u64,));
    assert!(key.as_str().starts_with("profiles:"));
    assert!(manager.store().unwrap().exists(key.as_str()).await.unwrap());
}

#[tokio::test]
async fn test_manager_invalidate_forces_recompute() {
    let manager = common::memory_manager("").await;
    let calls = Arc::new(AtomicUsize::new(0));
    let lookup = counting_lookup(manager.handle(), calls.clone()).with_prefix("profiles:");

    lookup.call((5,)).await.unwrap();
    let removed = manager
        .invalidate(lookup.id(), &(5_u64,), Some("profiles:"))
        .await
        .unwrap();
    assert!(removed);

    lookup.call((5,)).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_clear_prefix_drops_only_that_namespace() {
    let manager = common::memory_manager("").await;
    let calls = Arc::new(AtomicUsize::new(0));
    let profiles = counting_lookup(manager.handle(), calls.clone()).with_prefix("profiles:");
    let archive = counting_lookup(manager.handle(), calls.clone()).with_prefix("archive:");

    profiles.call((1,)).await.unwrap();
    profiles.call((2,)).await.unwrap();
    archive.call((1,)).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    assert_eq!(manager.clear("profiles:").await.unwrap(), 2);

    archive.call((1,)).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    profiles.call((1,)).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_shutdown_degrades_to_compute() {
    let manager = common::memory_manager("").await;
    let calls = Arc::new(AtomicUsize::new(0));
    let lookup = counting_lookup(manager.handle(), calls.clone());

    lookup.call((9,)).await.unwrap();
    manager.shutdown().await;

    lookup.call((9,)).await.unwrap();
    lookup.call((9,)).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_keyword_calls_are_order_independent() {
    let manager = common::memory_manager("").await;
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let search = Memoized::new(function_id!("search"), manager.handle(), move |args: CallArgs| {
        counter.fetch_add(1, Ordering::SeqCst);
        futures::future::ready(Ok::<_, MemoraError>(args.keyword().len()))
    });

    let forward = CallArgs::new().kwarg("name", "ada").kwarg("tag", "admin");
    let backward = CallArgs::new().kwarg("tag", "admin").kwarg("name", "ada");
    assert_eq!(search.call(forward).await.unwrap(), 2);
    assert_eq!(search.call(backward).await.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let query = Kwargs(ProfileQuery {
        name: "ada".to_string(),
        tag: Some("admin".to_string()),
    });
    assert_eq!(
        search.key_for(&query),
        search.key_for(&CallArgs::new().kwarg("name", "ada").kwarg("tag", "admin"))
    );
}
