//! Keyed query cache with request coalescing and tag invalidation.
//!
//! [`OperationCache`] is cheap to clone; every clone shares the same
//! entries. It is constructed explicitly and handed to the services that
//! need it, never stored in a global.
//!
//! # Ordering
//!
//! Each entry carries an epoch. [`invalidate`](OperationCache::invalidate)
//! bumps the epoch and detaches any in-flight fetch, so:
//!
//! - queries issued after an invalidation always start a new fetch;
//! - a fetch that started before the invalidation still resolves its own
//!   waiters, but its value is discarded instead of being stored.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::events::{CacheEvent, CacheEventKind, EventBus, DEFAULT_CAPACITY};
use crate::key::QueryKey;
use crate::mutation::{MutationOutcome, MutationRegistry};
use crate::subscription::QuerySubscription;

/// Type-erased cached value.
type AnyValue = Arc<dyn Any + Send + Sync>;

/// A fetch shared by every caller that asked for the same key while it
/// was in flight.
type SharedFetch<E> = Shared<BoxFuture<'static, Result<AnyValue, E>>>;

/// Default time an unobserved entry is kept before garbage collection.
pub const DEFAULT_GC_TIME: Duration = Duration::from_secs(5 * 60);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunable cache parameters.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long an entry with no observers survives after its last update.
    pub gc_time: Duration,
    /// Buffer size of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            gc_time: DEFAULT_GC_TIME,
            event_capacity: DEFAULT_CAPACITY,
        }
    }
}

// ---------------------------------------------------------------------------
// Query state snapshot
// ---------------------------------------------------------------------------

/// Point-in-time view of one key.
pub enum QueryState<T, E> {
    /// Nothing cached and nothing in flight.
    Idle,
    /// First fetch in flight, no value yet.
    Loading,
    /// Cached value inside its freshness window.
    Fresh(Arc<T>),
    /// Cached value that the next query will re-fetch.
    Stale(Arc<T>),
    /// The last fetch failed.
    Error(E),
}

impl<T, E: fmt::Debug> fmt::Debug for QueryState<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryState::Idle => f.write_str("Idle"),
            QueryState::Loading => f.write_str("Loading"),
            QueryState::Fresh(_) => f.write_str("Fresh(..)"),
            QueryState::Stale(_) => f.write_str("Stale(..)"),
            QueryState::Error(e) => f.debug_tuple("Error").field(e).finish(),
        }
    }
}

impl<T, E> QueryState<T, E> {
    /// The cached value, fresh or stale.
    pub fn data(&self) -> Option<&Arc<T>> {
        match self {
            QueryState::Fresh(v) | QueryState::Stale(v) => Some(v),
            _ => None,
        }
    }

    /// True only while the first fetch runs; a refetch over a stale value
    /// reports [`QueryState::Stale`].
    pub fn is_loading(&self) -> bool {
        matches!(self, QueryState::Loading)
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

struct Entry<E> {
    key: QueryKey,
    data: Option<AnyValue>,
    error: Option<E>,
    updated_at: Option<Instant>,
    stale_time: Duration,
    invalidated: bool,
    epoch: u64,
    in_flight: Option<SharedFetch<E>>,
    observers: usize,
}

impl<E> Entry<E> {
    fn new(key: QueryKey) -> Self {
        Self {
            key,
            data: None,
            error: None,
            updated_at: None,
            stale_time: Duration::ZERO,
            invalidated: false,
            epoch: 0,
            in_flight: None,
            observers: 0,
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        self.data.is_some()
            && self.error.is_none()
            && !self.invalidated
            && self
                .updated_at
                .is_some_and(|at| now.saturating_duration_since(at) < self.stale_time)
    }

    fn is_collectable(&self, now: Instant, gc_time: Duration) -> bool {
        self.observers == 0
            && self.in_flight.is_none()
            && self
                .updated_at
                .map_or(true, |at| now.saturating_duration_since(at) >= gc_time)
    }
}

struct Inner<E> {
    entries: Mutex<HashMap<QueryKey, Entry<E>>>,
    mutations: MutationRegistry,
    events: EventBus,
    config: CacheConfig,
}

// ---------------------------------------------------------------------------
// OperationCache
// ---------------------------------------------------------------------------

/// Shared cache of query results plus the mutation registry.
///
/// `E` is the error type produced by fetchers. It must be `Clone` so one
/// failed fetch can be handed to every coalesced waiter.
pub struct OperationCache<E> {
    inner: Arc<Inner<E>>,
}

impl<E> Clone for OperationCache<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> Default for OperationCache<E>
where
    E: Clone + fmt::Display + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl<E> OperationCache<E>
where
    E: Clone + fmt::Display + Send + Sync + 'static,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                mutations: MutationRegistry::new(),
                events: EventBus::new(config.event_capacity),
                config,
            }),
        }
    }

    /// Read `key`, fetching it if it is missing, stale or invalidated.
    ///
    /// - A value younger than `stale_time` is returned without a fetch.
    /// - If a fetch for `key` is already in flight, this call joins it
    ///   instead of starting another one.
    /// - Otherwise `fetcher` is invoked once and its result is stored.
    ///
    /// The fetch runs on its own task, so it completes (and fills the
    /// cache) even if every caller stops waiting. Failures are stored on
    /// the entry and returned; they are never retried automatically.
    pub async fn fetch_query<T, F, Fut>(
        &self,
        key: &QueryKey,
        stale_time: Duration,
        fetcher: F,
    ) -> Result<Arc<T>, E>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (fetch, unused_fetcher) = {
            let mut entries = self.inner.entries.lock();
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| Entry::new(key.clone()));
            entry.stale_time = stale_time;

            if entry.is_fresh(Instant::now()) {
                if let Some(value) = entry.data.clone() {
                    match value.downcast::<T>() {
                        Ok(value) => {
                            tracing::debug!(key = %key, "Cache hit");
                            return Ok(value);
                        }
                        Err(_) => {
                            tracing::warn!(key = %key, "Cached value has an unexpected type; refetching");
                        }
                    }
                }
            }

            match &entry.in_flight {
                Some(shared) => {
                    tracing::debug!(key = %key, "Joining in-flight fetch");
                    (shared.clone(), Some(fetcher))
                }
                None => {
                    tracing::debug!(key = %key, epoch = entry.epoch, "Cache miss, fetching");
                    let shared = self.start_fetch(key.clone(), entry.epoch, fetcher);
                    entry.in_flight = Some(shared.clone());
                    (shared, None)
                }
            }
        };

        let value = fetch.await?;
        match (value.downcast::<T>(), unused_fetcher) {
            (Ok(value), _) => Ok(value),
            // Joined a fetch started for a different value type under the
            // same key: answer this caller directly, uncached.
            (Err(_), Some(fetcher)) => {
                tracing::warn!(key = %key, "In-flight fetch has an unexpected type; fetching directly");
                fetcher().await.map(Arc::new)
            }
            (Err(_), None) => unreachable!("a fetch started by this call yields its own type"),
        }
    }

    /// Snapshot the state of `key` without fetching.
    pub fn query_state<T>(&self, key: &QueryKey) -> QueryState<T, E>
    where
        T: Send + Sync + 'static,
    {
        let entries = self.inner.entries.lock();
        let Some(entry) = entries.get(key) else {
            return QueryState::Idle;
        };
        if let Some(err) = &entry.error {
            return QueryState::Error(err.clone());
        }
        let data = entry
            .data
            .clone()
            .and_then(|value| value.downcast::<T>().ok());
        match data {
            Some(value) if entry.is_fresh(Instant::now()) => QueryState::Fresh(value),
            Some(value) => QueryState::Stale(value),
            None if entry.in_flight.is_some() => QueryState::Loading,
            None => QueryState::Idle,
        }
    }

    /// Whether a fetch for `key` is currently in flight.
    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.inner
            .entries
            .lock()
            .get(key)
            .is_some_and(|entry| entry.in_flight.is_some())
    }

    /// Mark every entry tagged `tag` as stale and detach in-flight fetches.
    ///
    /// Returns the number of entries affected.
    pub fn invalidate(&self, tag: &str) -> usize {
        let affected = {
            let mut entries = self.inner.entries.lock();
            let mut affected = 0;
            for entry in entries.values_mut().filter(|e| e.key.has_tag(tag)) {
                entry.invalidated = true;
                entry.epoch += 1;
                entry.in_flight = None;
                affected += 1;
            }
            affected
        };

        tracing::debug!(tag, affected, "Invalidated cache tag");
        self.inner
            .events
            .publish(CacheEventKind::Invalidated {
                tag: tag.to_string(),
                affected,
            });
        affected
    }

    /// Run a mutation through the registry. The cache itself is not
    /// touched; callers invalidate explicitly based on the outcome.
    pub async fn mutate<T, Fut>(&self, name: &str, operation: Fut) -> MutationOutcome<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        self.inner.mutations.mutate(name, operation).await
    }

    pub fn mutations(&self) -> &MutationRegistry {
        &self.inner.mutations
    }

    /// Register an observer of `key`.
    pub fn subscribe(&self, key: QueryKey) -> QuerySubscription<E> {
        {
            let mut entries = self.inner.entries.lock();
            entries
                .entry(key.clone())
                .or_insert_with(|| Entry::new(key.clone()))
                .observers += 1;
        }
        QuerySubscription::new(self.clone(), key)
    }

    pub(crate) fn release_observer(&self, key: &QueryKey) {
        if let Some(entry) = self.inner.entries.lock().get_mut(key) {
            entry.observers = entry.observers.saturating_sub(1);
        }
    }

    /// Receive [`CacheEvent`]s published from now on.
    pub fn events(&self) -> broadcast::Receiver<CacheEvent> {
        self.inner.events.subscribe()
    }

    /// Evict entries nobody observes that have been idle for at least
    /// the configured `gc_time`. Returns the number evicted.
    pub fn collect_garbage(&self) -> usize {
        let now = Instant::now();
        let gc_time = self.inner.config.gc_time;
        let evicted: Vec<QueryKey> = {
            let mut entries = self.inner.entries.lock();
            let keys: Vec<QueryKey> = entries
                .values()
                .filter(|e| e.is_collectable(now, gc_time))
                .map(|e| e.key.clone())
                .collect();
            for key in &keys {
                entries.remove(key);
            }
            keys
        };

        for key in &evicted {
            tracing::debug!(key = %key, "Evicted cache entry");
            self.inner
                .events
                .publish(CacheEventKind::Evicted { key: key.clone() });
        }
        evicted.len()
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ---- private helpers ----

    /// Build the shared fetch future and drive it on its own task.
    fn start_fetch<T, F, Fut>(&self, key: QueryKey, epoch: u64, fetcher: F) -> SharedFetch<E>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let fetch = async move {
            let result = fetcher().await.map(|value| Arc::new(value) as AnyValue);
            settle(&inner, &key, epoch, &result);
            result
        }
        .boxed()
        .shared();

        tokio::spawn(fetch.clone());
        fetch
    }
}

/// Store a settled fetch, unless its key was invalidated meanwhile.
fn settle<E>(inner: &Inner<E>, key: &QueryKey, epoch: u64, result: &Result<AnyValue, E>)
where
    E: Clone + fmt::Display,
{
    let kind = {
        let mut entries = inner.entries.lock();
        match entries.get_mut(key) {
            Some(entry) if entry.epoch == epoch => {
                entry.in_flight = None;
                match result {
                    Ok(value) => {
                        entry.data = Some(Arc::clone(value));
                        entry.error = None;
                        entry.invalidated = false;
                        entry.updated_at = Some(Instant::now());
                        CacheEventKind::Fetched { key: key.clone() }
                    }
                    Err(err) => {
                        entry.error = Some(err.clone());
                        entry.updated_at = Some(Instant::now());
                        CacheEventKind::FetchFailed {
                            key: key.clone(),
                            message: err.to_string(),
                        }
                    }
                }
            }
            _ => CacheEventKind::Discarded { key: key.clone() },
        }
    };

    match &kind {
        CacheEventKind::FetchFailed { message, .. } => {
            tracing::warn!(key = %key, error = %message, "Query fetch failed");
        }
        CacheEventKind::Discarded { .. } => {
            tracing::debug!(key = %key, epoch, "Discarded result of invalidated fetch");
        }
        _ => {}
    }
    inner.events.publish(kind);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
