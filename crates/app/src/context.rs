use std::sync::Arc;

use spritegen_cache::{CacheConfig, OperationCache};
use spritegen_client::{ApiError, ClientConfig, GenerationGateway, HttpGateway};

use crate::history::HistoryPaginator;
use crate::models::ModelCatalogService;
use crate::orchestrator::GenerationOrchestrator;

/// Explicitly wired dependencies shared by every service.
///
/// Cloning is cheap: the gateway, the cache and the orchestrator are
/// reference counted, so every clone talks to the same cache and shares
/// one submission slot.
#[derive(Clone)]
pub struct AppContext {
    pub gateway: Arc<dyn GenerationGateway>,
    pub cache: OperationCache<ApiError>,
    pub config: ClientConfig,
    orchestrator: Arc<GenerationOrchestrator>,
}

impl AppContext {
    /// Wire `gateway` to a fresh cache and orchestrator.
    pub fn new(gateway: Arc<dyn GenerationGateway>, config: ClientConfig) -> Self {
        let cache = OperationCache::new(CacheConfig::default());
        let orchestrator = Arc::new(GenerationOrchestrator::new(
            Arc::clone(&gateway),
            cache.clone(),
        ));
        Self {
            gateway,
            cache,
            config,
            orchestrator,
        }
    }

    /// Build the HTTP gateway from `config`.
    pub fn connect(config: ClientConfig) -> Result<Self, ApiError> {
        let gateway = HttpGateway::new(&config)?;
        tracing::info!(api_url = %config.api_url, "Gateway configured");
        Ok(Self::new(Arc::new(gateway), config))
    }

    /// The context's single orchestrator. Every handle shares the
    /// submitting state and the current result.
    pub fn orchestrator(&self) -> Arc<GenerationOrchestrator> {
        Arc::clone(&self.orchestrator)
    }

    /// A history view starting on page 1 with the configured page size.
    pub fn history(&self) -> HistoryPaginator {
        HistoryPaginator::new(
            Arc::clone(&self.gateway),
            self.cache.clone(),
            self.config.history_page_size,
            self.config.history_stale_time(),
        )
    }

    /// The model catalog service, cached for `models_stale_time`.
    pub fn models(&self) -> ModelCatalogService {
        ModelCatalogService::new(
            Arc::clone(&self.gateway),
            self.cache.clone(),
            self.config.models_stale_time(),
        )
    }
}
