//! Paged, filtered history reads through the operation cache.

use std::sync::Arc;
use std::time::Duration;

use spritegen_cache::{CacheEventKind, OperationCache, QueryKey, QueryState, QuerySubscription};
use spritegen_client::{ApiError, GenerationGateway};
use spritegen_core::pagination::{
    has_next, has_prev, page_window, shows_pagination, HistoryFilters, HistoryParams, HistoryQuery,
    PageItem,
};
use spritegen_core::types::{Generation, HistoryPage, Provider};

use crate::error::AppResult;

/// Cache tag carried by every history listing and detail entry.
pub const HISTORY_TAG: &str = "history";

/// Mutation name under which deletes are tracked.
pub const DELETE_MUTATION: &str = "delete-generation";

/// Cache key of one listing: `["history", page, page_size, search, provider]`.
pub fn history_key(params: &HistoryParams) -> QueryKey {
    QueryKey::new([
        HISTORY_TAG.to_string(),
        params.page.to_string(),
        params.page_size.to_string(),
        params.filters.search.clone().unwrap_or_default(),
        params
            .filters
            .provider
            .map(|p| p.as_str().to_string())
            .unwrap_or_default(),
    ])
}

/// Cache key of one generation record: `["history", "detail", id]`.
pub fn detail_key(id: &str) -> QueryKey {
    QueryKey::new([HISTORY_TAG, "detail", id])
}

/// What the pagination controls under a listing should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageControls {
    /// False when there is at most one page; no controls are drawn then.
    pub visible: bool,
    pub has_prev: bool,
    pub has_next: bool,
    pub window: Vec<PageItem>,
}

impl PageControls {
    pub fn new(page: u32, total_pages: u32) -> Self {
        let visible = shows_pagination(total_pages);
        Self {
            visible,
            has_prev: visible && has_prev(page),
            has_next: visible && has_next(page, total_pages),
            window: if visible {
                page_window(page, total_pages)
            } else {
                Vec::new()
            },
        }
    }
}

/// A display surface's interest in one history page.
///
/// Holds the listing parameters alongside the cache subscription so the
/// page is always fetched under its own key.
pub struct HistorySubscription {
    params: HistoryParams,
    subscription: QuerySubscription<ApiError>,
}

impl HistorySubscription {
    /// Page and filters this subscription observes.
    pub fn params(&self) -> &HistoryParams {
        &self.params
    }

    pub fn key(&self) -> &QueryKey {
        self.subscription.key()
    }

    /// Wait until the observed page should be re-read; `None` once cancelled.
    pub async fn changed(&mut self) -> Option<CacheEventKind> {
        self.subscription.changed().await
    }

    pub fn cancel(&self) {
        self.subscription.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.subscription.is_cancelled()
    }
}

/// History view state plus the reads and deletes it issues.
///
/// Filter changes always reset the page to 1. Deleting the last item
/// on a page does not move the page back; the caller decides whether
/// to step back.
pub struct HistoryPaginator {
    gateway: Arc<dyn GenerationGateway>,
    cache: OperationCache<ApiError>,
    query: HistoryQuery,
    stale_time: Duration,
}

impl HistoryPaginator {
    pub fn new(
        gateway: Arc<dyn GenerationGateway>,
        cache: OperationCache<ApiError>,
        page_size: u32,
        stale_time: Duration,
    ) -> Self {
        Self {
            gateway,
            cache,
            query: HistoryQuery::new(page_size),
            stale_time,
        }
    }

    pub fn query(&self) -> &HistoryQuery {
        &self.query
    }

    pub fn params(&self) -> HistoryParams {
        self.query.params()
    }

    pub fn set_page(&mut self, page: u32) {
        self.query.set_page(page);
    }

    /// Step forward one page. Not bounded by `total_pages`; the caller
    /// checks [`PageControls::has_next`].
    pub fn next_page(&mut self) {
        self.query.set_page(self.query.page().saturating_add(1));
    }

    /// Step back one page, stopping at page 1.
    pub fn prev_page(&mut self) {
        self.query.set_page(self.query.page().saturating_sub(1));
    }

    /// Change the search text. Resets to page 1.
    pub fn set_search(&mut self, search: Option<&str>) {
        self.query.set_search(search);
    }

    /// Change the provider filter. Resets to page 1.
    pub fn set_provider(&mut self, provider: Option<Provider>) {
        self.query.set_provider(provider);
    }

    /// Replace every filter at once. Resets to page 1.
    pub fn set_filters(&mut self, filters: HistoryFilters) {
        self.query.set_filters(filters);
    }

    /// Read the current page through the cache.
    pub async fn load(&self) -> AppResult<Arc<HistoryPage>> {
        self.list(&self.query.params()).await
    }

    /// Read an arbitrary page through the cache.
    pub async fn list(&self, params: &HistoryParams) -> AppResult<Arc<HistoryPage>> {
        let key = history_key(params);
        let gateway = Arc::clone(&self.gateway);
        let params = params.clone();
        let page = self
            .cache
            .fetch_query(&key, self.stale_time, move || async move {
                gateway.list_history(&params).await
            })
            .await?;
        Ok(page)
    }

    /// Snapshot of the current page without fetching.
    pub fn state(&self) -> QueryState<HistoryPage, ApiError> {
        self.cache.query_state(&history_key(&self.query.params()))
    }

    /// Observe the current page. The subscription captures the page and
    /// filters in effect now; later paging does not retarget it.
    pub fn subscribe(&self) -> HistorySubscription {
        let params = self.query.params();
        let subscription = self.cache.subscribe(history_key(&params));
        HistorySubscription {
            params,
            subscription,
        }
    }

    /// Read the subscribed page as an observer: `None` if `subscription`
    /// is cancelled before the response arrives.
    pub async fn load_for(
        &self,
        subscription: &HistorySubscription,
    ) -> Option<AppResult<Arc<HistoryPage>>> {
        let gateway = Arc::clone(&self.gateway);
        let params = subscription.params.clone();
        subscription
            .subscription
            .fetch(self.stale_time, move || async move {
                gateway.list_history(&params).await
            })
            .await
            .map(|result| result.map_err(Into::into))
    }

    /// Fetch one generation record through the cache.
    pub async fn detail(&self, id: &str) -> AppResult<Arc<Generation>> {
        let gateway = Arc::clone(&self.gateway);
        let id_owned = id.to_string();
        let generation = self
            .cache
            .fetch_query(&detail_key(id), self.stale_time, move || async move {
                gateway.get_generation(&id_owned).await
            })
            .await?;
        Ok(generation)
    }

    /// Delete a generation. Only a successful delete invalidates the
    /// history tag; a not-found answer is returned and changes nothing.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let gateway = Arc::clone(&self.gateway);
        let id_owned = id.to_string();
        self.cache
            .mutate(DELETE_MUTATION, async move {
                gateway.delete_generation(&id_owned).await
            })
            .await
            .into_result()
            .inspect_err(|err| tracing::warn!(generation_id = %id, error = %err, "Delete failed"))?;

        tracing::info!(generation_id = %id, "Generation deleted");
        self.cache.invalidate(HISTORY_TAG);
        Ok(())
    }

    pub fn is_deleting(&self) -> bool {
        self.cache.mutations().is_pending(DELETE_MUTATION)
    }

    /// Pagination controls for `page` as returned by the server.
    pub fn controls(&self, page: &HistoryPage) -> PageControls {
        PageControls::new(self.query.page(), page.total_pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_keys_differ_by_every_parameter() {
        let base = HistoryParams {
            page: 1,
            page_size: 12,
            filters: HistoryFilters::default(),
        };
        let other_page = HistoryParams { page: 2, ..base.clone() };
        let searched = HistoryParams {
            filters: HistoryFilters::new(Some("knight"), None),
            ..base.clone()
        };
        let provider = HistoryParams {
            filters: HistoryFilters::new(None, Some(Provider::Gemini)),
            ..base.clone()
        };

        let keys = [&base, &other_page, &searched, &provider].map(history_key);
        for (i, a) in keys.iter().enumerate() {
            assert!(a.has_tag(HISTORY_TAG));
            for b in &keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(history_key(&base).to_string(), "history/1/12//");
    }

    #[test]
    fn detail_key_is_tagged_history() {
        assert!(detail_key("abc").has_tag(HISTORY_TAG));
    }

    #[test]
    fn controls_hidden_for_single_page() {
        let controls = PageControls::new(1, 1);
        assert!(!controls.visible);
        assert!(!controls.has_prev && !controls.has_next);
        assert!(controls.window.is_empty());
    }

    #[test]
    fn controls_for_middle_page() {
        let controls = PageControls::new(5, 10);
        assert!(controls.visible && controls.has_prev && controls.has_next);
        assert_eq!(
            controls.window,
            vec![
                PageItem::Page(1),
                PageItem::Ellipsis,
                PageItem::Page(4),
                PageItem::Page(5),
                PageItem::Page(6),
                PageItem::Ellipsis,
                PageItem::Page(10),
            ]
        );
    }
}
