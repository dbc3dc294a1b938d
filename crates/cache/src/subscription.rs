//! Observer handles for cached queries.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::cache::{OperationCache, QueryState};
use crate::events::{CacheEvent, CacheEventKind};
use crate::key::QueryKey;

/// A display surface's interest in one key.
///
/// While a subscription is alive its entry is never garbage collected.
/// Dropping (or [`cancel`](Self::cancel)ling) it stops any pending
/// [`fetch`](Self::fetch) or [`changed`](Self::changed) call from
/// delivering a result to this observer; the underlying request still
/// completes and fills the cache for everyone else.
pub struct QuerySubscription<E>
where
    E: Clone + fmt::Display + Send + Sync + 'static,
{
    cache: OperationCache<E>,
    key: QueryKey,
    token: CancellationToken,
    events: broadcast::Receiver<CacheEvent>,
}

impl<E> QuerySubscription<E>
where
    E: Clone + fmt::Display + Send + Sync + 'static,
{
    pub(crate) fn new(cache: OperationCache<E>, key: QueryKey) -> Self {
        let events = cache.events();
        Self {
            cache,
            key,
            token: CancellationToken::new(),
            events,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Fetch through the cache. Returns `None` if the subscription is
    /// cancelled before the result arrives.
    pub async fn fetch<T, F, Fut>(&self, stale_time: Duration, fetcher: F) -> Option<Result<Arc<T>, E>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                tracing::debug!(key = %self.key, "Subscription cancelled before fetch settled");
                None
            }
            result = self.cache.fetch_query(&self.key, stale_time, fetcher) => Some(result),
        }
    }

    pub fn state<T>(&self) -> QueryState<T, E>
    where
        T: Send + Sync + 'static,
    {
        self.cache.query_state(&self.key)
    }

    /// Wait for the next event that means this key should be re-read.
    ///
    /// Returns `None` once the subscription is cancelled.
    pub async fn changed(&mut self) -> Option<CacheEventKind> {
        loop {
            let event = tokio::select! {
                biased;
                _ = self.token.cancelled() => return None,
                event = self.events.recv() => event,
            };
            match event {
                Ok(event) if event.affects(&self.key) => return Some(event.kind),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(key = %self.key, skipped, "Subscription lagged behind cache events");
                    // Missed events may have touched this key; tell the
                    // observer to re-read.
                    return Some(CacheEventKind::Invalidated {
                        tag: self.key.segments().first().cloned().unwrap_or_default(),
                        affected: 0,
                    });
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Stop delivering results to this observer.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl<E> Drop for QuerySubscription<E>
where
    E: Clone + fmt::Display + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.token.cancel();
        self.cache.release_observer(&self.key);
    }
}
