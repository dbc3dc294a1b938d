//! Mutation bookkeeping.
//!
//! A mutation is a one-shot remote write. The registry only tracks which
//! named mutations are pending; it never reads or writes query entries.
//! Callers inspect the returned [`MutationOutcome`] and decide what to
//! invalidate.

use std::collections::HashMap;
use std::future::Future;

use parking_lot::Mutex;

/// Discriminated result of a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome<T, E> {
    Success(T),
    Failure(E),
}

impl<T, E> MutationOutcome<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, MutationOutcome::Success(_))
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            MutationOutcome::Success(value) => Ok(value),
            MutationOutcome::Failure(err) => Err(err),
        }
    }
}

impl<T, E> From<Result<T, E>> for MutationOutcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => MutationOutcome::Success(value),
            Err(err) => MutationOutcome::Failure(err),
        }
    }
}

/// Tracks in-flight mutations by name.
#[derive(Default)]
pub struct MutationRegistry {
    pending: Mutex<HashMap<String, usize>>,
}

impl MutationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `operation`, marking `name` as pending until it settles or the
    /// returned future is dropped.
    pub async fn mutate<T, E, Fut>(&self, name: &str, operation: Fut) -> MutationOutcome<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        let _guard = PendingGuard::enter(self, name);
        tracing::debug!(mutation = name, "Mutation started");
        let outcome = MutationOutcome::from(operation.await);
        tracing::debug!(mutation = name, success = outcome.is_success(), "Mutation settled");
        outcome
    }

    /// Whether any mutation called `name` is in flight.
    pub fn is_pending(&self, name: &str) -> bool {
        self.pending.lock().get(name).is_some_and(|n| *n > 0)
    }

    /// Total number of in-flight mutations.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().values().sum()
    }
}

/// Decrements the pending count on drop, so cancelled mutations do not
/// stay pending forever.
struct PendingGuard<'a> {
    registry: &'a MutationRegistry,
    name: String,
}

impl<'a> PendingGuard<'a> {
    fn enter(registry: &'a MutationRegistry, name: &str) -> Self {
        *registry.pending.lock().entry(name.to_string()).or_insert(0) += 1;
        Self {
            registry,
            name: name.to_string(),
        }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut pending = self.registry.pending.lock();
        if let Some(count) = pending.get_mut(&self.name) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                pending.remove(&self.name);
            }
        }
    }
}
