//! Cache notifications, fanned out over a `tokio::sync::broadcast`
//! channel.
//!
//! Display surfaces subscribe to learn that a key they render has been
//! invalidated and should be re-read. There is no server push: every
//! event originates from a fetch, an invalidation or an eviction made by
//! this process.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::key::QueryKey;

/// Default buffer capacity for the broadcast channel.
pub(crate) const DEFAULT_CAPACITY: usize = 256;

/// What happened inside the cache.
#[derive(Debug, Clone)]
pub enum CacheEventKind {
    /// A fetch settled successfully and its value was stored.
    Fetched { key: QueryKey },

    /// A fetch failed; the error is stored on the entry.
    FetchFailed { key: QueryKey, message: String },

    /// A settled fetch was discarded because its key was invalidated
    /// while the request was in flight.
    Discarded { key: QueryKey },

    /// Every entry carrying `tag` was marked stale.
    Invalidated { tag: String, affected: usize },

    /// An unobserved entry was removed by garbage collection.
    Evicted { key: QueryKey },
}

/// A cache notification with its creation time.
#[derive(Debug, Clone)]
pub struct CacheEvent {
    pub kind: CacheEventKind,
    pub timestamp: DateTime<Utc>,
}

impl CacheEvent {
    pub fn new(kind: CacheEventKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
        }
    }

    /// Whether this event means readers of `key` should re-read.
    pub fn affects(&self, key: &QueryKey) -> bool {
        match &self.kind {
            CacheEventKind::Fetched { key: k }
            | CacheEventKind::FetchFailed { key: k, .. }
            | CacheEventKind::Evicted { key: k } => k == key,
            CacheEventKind::Invalidated { tag, .. } => key.has_tag(tag),
            CacheEventKind::Discarded { .. } => false,
        }
    }
}

/// Fan-out sender for [`CacheEvent`]s.
pub(crate) struct EventBus {
    sender: broadcast::Sender<CacheEvent>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub(crate) fn publish(&self, kind: CacheEventKind) {
        // Ignore the SendError: it only means there are zero receivers.
        let _ = self.sender.send(CacheEvent::new(kind));
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.sender.subscribe()
    }
}
