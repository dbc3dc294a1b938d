//! History pagination state and the bounded page-window algorithm.
//!
//! [`page_window`] is a pure function of `(current, total)` so the
//! pagination controls can be rendered (and tested) without listing
//! every page. [`HistoryQuery`] owns the page/filter pair and enforces
//! the rule that any filter change resets the page to 1.

use serde::{Deserialize, Serialize};

use crate::types::Provider;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default number of generations per history page.
pub const DEFAULT_PAGE_SIZE: u32 = 12;

/// Page size used by the server when none is sent.
pub const SERVER_DEFAULT_PAGE_SIZE: u32 = 20;

// ---------------------------------------------------------------------------
// Page window
// ---------------------------------------------------------------------------

/// One slot in the rendered pagination control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageItem {
    Page(u32),
    Ellipsis,
}

/// Compute the visible page slots for page `current` of `total`.
///
/// The visible set is `{1, total} ∪ {current-1, current, current+1}`
/// clipped to `[1, total]`, ascending and without duplicates. A gap of
/// more than one page between consecutive numbers collapses into a
/// single [`PageItem::Ellipsis`].
///
/// `total == 0` yields an empty window. `current` is clamped into range.
///
/// # Examples
///
/// ```
/// use spritegen_core::pagination::{page_window, PageItem::*};
/// assert_eq!(
///     page_window(5, 10),
///     vec![Page(1), Ellipsis, Page(4), Page(5), Page(6), Ellipsis, Page(10)]
/// );
/// assert_eq!(page_window(1, 3), vec![Page(1), Page(2), Page(3)]);
/// ```
pub fn page_window(current: u32, total: u32) -> Vec<PageItem> {
    if total == 0 {
        return Vec::new();
    }
    let current = current.clamp(1, total);

    let mut visible = vec![1, current.saturating_sub(1), current, current + 1, total];
    visible.retain(|p| (1..=total).contains(p));
    visible.sort_unstable();
    visible.dedup();

    let mut items = Vec::with_capacity(visible.len() * 2);
    let mut previous: Option<u32> = None;
    for page in visible {
        if let Some(prev) = previous {
            if page - prev > 1 {
                items.push(PageItem::Ellipsis);
            }
        }
        items.push(PageItem::Page(page));
        previous = Some(page);
    }
    items
}

/// Whether pagination controls should be shown at all.
pub fn shows_pagination(total_pages: u32) -> bool {
    total_pages > 1
}

/// A "Prev" control is enabled on every page after the first.
pub fn has_prev(page: u32) -> bool {
    page > 1
}

/// A "Next" control is enabled until the last page reported by the server.
pub fn has_next(page: u32, total_pages: u32) -> bool {
    page < total_pages
}

// ---------------------------------------------------------------------------
// Filters and query state
// ---------------------------------------------------------------------------

/// History filters. Empty strings are normalised to "absent".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryFilters {
    pub search: Option<String>,
    pub provider: Option<Provider>,
}

impl HistoryFilters {
    pub fn new(search: Option<&str>, provider: Option<Provider>) -> Self {
        Self {
            search: normalize_search(search),
            provider,
        }
    }
}

/// Trim a search string, dropping it entirely when blank.
pub fn normalize_search(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parameters of one `listHistory` read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryParams {
    pub page: u32,
    pub page_size: u32,
    pub filters: HistoryFilters,
}

impl HistoryParams {
    /// Query-string pairs for the remote API. Absent filters are omitted.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("page_size", self.page_size.to_string()),
        ];
        if let Some(provider) = self.filters.provider {
            pairs.push(("provider", provider.as_str().to_string()));
        }
        if let Some(search) = &self.filters.search {
            pairs.push(("search", search.clone()));
        }
        pairs
    }
}

/// Page and filter state of the history view.
///
/// Filters and page are never applied independently: every filter
/// change resets the page to 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    page: u32,
    page_size: u32,
    filters: HistoryFilters,
}

impl HistoryQuery {
    /// `page_size` of zero is bumped to 1.
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            filters: HistoryFilters::default(),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn filters(&self) -> &HistoryFilters {
        &self.filters
    }

    /// Jump to `page` (floored at 1). The upper bound is left to the
    /// server, which answers with an empty page.
    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    /// Replace the filters and go back to the first page.
    pub fn set_filters(&mut self, filters: HistoryFilters) {
        self.filters = filters;
        self.page = 1;
    }

    pub fn set_search(&mut self, search: Option<&str>) {
        let filters = HistoryFilters {
            search: normalize_search(search),
            ..self.filters.clone()
        };
        self.set_filters(filters);
    }

    pub fn set_provider(&mut self, provider: Option<Provider>) {
        let filters = HistoryFilters {
            provider,
            ..self.filters.clone()
        };
        self.set_filters(filters);
    }

    pub fn params(&self) -> HistoryParams {
        HistoryParams {
            page: self.page,
            page_size: self.page_size,
            filters: self.filters.clone(),
        }
    }
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
