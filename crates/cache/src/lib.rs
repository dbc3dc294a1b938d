//! Async Operation Cache.
//!
//! This crate provides the single piece of shared mutable state in the
//! client:
//!
//! - [`OperationCache`] — keyed query cache with request coalescing,
//!   freshness windows and tag invalidation.
//! - [`QueryKey`] — structured cache key carrying its invalidation tags.
//! - [`QuerySubscription`] — a surface's handle on a key; late responses
//!   are dropped once it is cancelled.
//! - [`MutationRegistry`] — pending-state bookkeeping for mutations, which
//!   never touch query entries.
//! - [`CacheEvent`] — notifications broadcast on every fetch, failure,
//!   invalidation and eviction.

pub mod cache;
pub mod events;
pub mod key;
pub mod mutation;
pub mod subscription;

pub use cache::{CacheConfig, OperationCache, QueryState, DEFAULT_GC_TIME};
pub use events::{CacheEvent, CacheEventKind};
pub use key::QueryKey;
pub use mutation::{MutationOutcome, MutationRegistry};
pub use subscription::QuerySubscription;
