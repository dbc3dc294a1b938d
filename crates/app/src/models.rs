use std::sync::Arc;
use std::time::Duration;

use spritegen_cache::{OperationCache, QueryKey, QueryState};
use spritegen_client::{ApiError, GenerationGateway};
use spritegen_core::types::{ModelCatalog, ModelInfo};

use crate::error::AppResult;

/// Cache tag (and sole key segment) of the model catalog.
pub const MODELS_TAG: &str = "models";

/// Long-lived, stale-tolerant reads of the model catalog.
pub struct ModelCatalogService {
    gateway: Arc<dyn GenerationGateway>,
    cache: OperationCache<ApiError>,
    stale_time: Duration,
}

impl ModelCatalogService {
    pub fn new(
        gateway: Arc<dyn GenerationGateway>,
        cache: OperationCache<ApiError>,
        stale_time: Duration,
    ) -> Self {
        Self {
            gateway,
            cache,
            stale_time,
        }
    }

    fn key() -> QueryKey {
        QueryKey::new([MODELS_TAG])
    }

    /// The model catalog, served from the cache inside its freshness window.
    pub async fn models(&self) -> AppResult<Arc<ModelCatalog>> {
        let gateway = Arc::clone(&self.gateway);
        let catalog = self
            .cache
            .fetch_query(&Self::key(), self.stale_time, move || async move {
                gateway.list_models().await
            })
            .await?;
        tracing::debug!(count = catalog.models.len(), "Model catalog ready");
        Ok(catalog)
    }

    /// Look a model up by id, loading the catalog if needed.
    pub async fn find(&self, id: &str) -> AppResult<Option<ModelInfo>> {
        Ok(self.models().await?.find(id).cloned())
    }

    /// Snapshot of the catalog entry without fetching.
    pub fn state(&self) -> QueryState<ModelCatalog, ApiError> {
        self.cache.query_state(&Self::key())
    }

    /// Force the next read to re-fetch.
    pub fn refresh(&self) {
        self.cache.invalidate(MODELS_TAG);
    }
}
