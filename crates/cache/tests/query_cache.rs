//! Integration tests for `OperationCache`.
//!
//! These drive the cache the way the application services do: several
//! concurrent readers of the same listing, a mutation followed by tag
//! invalidation, and values of different types living side by side.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use spritegen_cache::{CacheEventKind, MutationOutcome, OperationCache, QueryKey, QueryState};
use tokio::sync::Notify;

const STALE: Duration = Duration::from_secs(30);

fn history_key(page: u32) -> QueryKey {
    QueryKey::new(["history".to_string(), page.to_string(), "12".to_string()])
}

// ---------------------------------------------------------------------------
// Test: readers on separate tasks share a single request
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_on_many_tasks_share_one_request() {
    let cache: OperationCache<String> = OperationCache::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());

    let mut readers = Vec::new();
    for _ in 0..8 {
        let cache = cache.clone();
        let calls = Arc::clone(&calls);
        let gate = Arc::clone(&gate);
        readers.push(tokio::spawn(async move {
            cache
                .fetch_query(&history_key(1), STALE, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    gate.notified().await;
                    Ok::<_, String>(vec!["gen_a".to_string(), "gen_b".to_string()])
                })
                .await
        }));
    }

    while !cache.is_fetching(&history_key(1)) {
        tokio::task::yield_now().await;
    }
    // Let every reader reach the in-flight fetch before releasing it.
    tokio::time::sleep(Duration::from_millis(20)).await;
    gate.notify_one();

    for reader in readers {
        let items = reader.await.unwrap().unwrap();
        assert_eq!(items.len(), 2);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Test: a successful mutation followed by invalidation refreshes listings
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mutation_then_invalidation_refreshes_listing() {
    let cache: OperationCache<String> = OperationCache::default();
    let listing = Arc::new(fake_server::Listing::new(["gen_a", "gen_b"]));

    let read = |listing: Arc<fake_server::Listing>| move || async move { Ok::<_, String>(listing.snapshot()) };

    let before = cache.fetch_query(&history_key(1), STALE, read(Arc::clone(&listing))).await.unwrap();
    assert_eq!(before.len(), 2);

    let outcome = cache
        .mutate("delete", {
            let listing = Arc::clone(&listing);
            async move { listing.remove("gen_a") }
        })
        .await;
    assert_matches!(outcome, MutationOutcome::Success(()));
    assert!(!cache.mutations().is_pending("delete"));

    // Still fresh until someone invalidates.
    let cached = cache.fetch_query(&history_key(1), STALE, read(Arc::clone(&listing))).await.unwrap();
    assert_eq!(cached.len(), 2);

    assert_eq!(cache.invalidate("history"), 1);
    let after = cache.fetch_query(&history_key(1), STALE, read(Arc::clone(&listing))).await.unwrap();
    assert_eq!(*after, vec!["gen_b".to_string()]);
}

// ---------------------------------------------------------------------------
// Test: a failed mutation leaves cached entries alone
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_mutation_does_not_touch_entries() {
    let cache: OperationCache<String> = OperationCache::default();
    cache
        .fetch_query(&history_key(1), STALE, || async { Ok::<_, String>(1u32) })
        .await
        .unwrap();

    let outcome: MutationOutcome<(), String> =
        cache.mutate("delete", async { Err("Not found".to_string()) }).await;
    assert!(!outcome.is_success());
    assert_matches!(cache.query_state::<u32>(&history_key(1)), QueryState::Fresh(_));
}

// ---------------------------------------------------------------------------
// Test: keys hold values of different types
// ---------------------------------------------------------------------------

#[tokio::test]
async fn keys_hold_values_of_different_types() {
    let cache: OperationCache<String> = OperationCache::default();
    let models = QueryKey::new(["models"]);

    cache
        .fetch_query(&models, STALE, || async { Ok::<_, String>(vec!["gemini-2.5-flash".to_string()]) })
        .await
        .unwrap();
    cache
        .fetch_query(&history_key(1), STALE, || async { Ok::<_, String>(7u64) })
        .await
        .unwrap();

    assert_matches!(cache.query_state::<Vec<String>>(&models), QueryState::Fresh(v) if v[0] == "gemini-2.5-flash");
    assert_matches!(cache.query_state::<u64>(&history_key(1)), QueryState::Fresh(v) if *v == 7);
    assert_eq!(cache.len(), 2);
}

// ---------------------------------------------------------------------------
// Test: events describe the fetch lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn events_describe_fetch_lifecycle() {
    let cache: OperationCache<String> = OperationCache::default();
    let mut events = cache.events();

    cache
        .fetch_query(&history_key(1), STALE, || async { Ok::<_, String>(1u32) })
        .await
        .unwrap();
    let _ = cache
        .fetch_query(&history_key(2), STALE, || async { Err::<u32, _>("HTTP 500".to_string()) })
        .await;

    assert_matches!(events.recv().await.unwrap().kind, CacheEventKind::Fetched { .. });
    assert_matches!(
        events.recv().await.unwrap().kind,
        CacheEventKind::FetchFailed { ref message, .. } if message == "HTTP 500"
    );
}

/// Minimal server-side stand-in for the listing tests.
mod fake_server {
    use std::sync::Mutex;

    pub struct Listing(Mutex<Vec<String>>);

    impl Listing {
        pub fn new<const N: usize>(items: [&str; N]) -> Self {
            Self(Mutex::new(items.iter().map(|s| s.to_string()).collect()))
        }

        pub fn snapshot(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }

        pub fn remove(&self, id: &str) -> Result<(), String> {
            let mut items = self.0.lock().unwrap();
            let before = items.len();
            items.retain(|item| item != id);
            if items.len() == before {
                return Err("Not found".to_string());
            }
            Ok(())
        }
    }
}
