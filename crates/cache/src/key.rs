//! Structured cache keys.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a cached query.
///
/// A key is an ordered list of segments, e.g. `["history", "1", "12"]`.
/// The first segment is always one of its tags; extra tags can be added
/// with [`with_tag`](Self::with_tag). Equality and hashing consider the
/// segments only.
#[derive(Debug, Clone)]
pub struct QueryKey {
    segments: Vec<String>,
    tags: BTreeSet<String>,
}

impl QueryKey {
    /// Build a key from its segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        let tags = segments.first().cloned().into_iter().collect();
        Self { segments, tags }
    }

    /// Attach an additional invalidation tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    /// Whether invalidating `tag` affects this key.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

impl PartialEq for QueryKey {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for QueryKey {}

impl Hash for QueryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments.hash(state);
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}
