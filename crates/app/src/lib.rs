//! Application services behind the generation UI surfaces.
//!
//! Everything is constructed explicitly from an [`AppContext`]: one
//! gateway, one [`OperationCache`](spritegen_cache::OperationCache) and
//! the client configuration. No service reaches for ambient state.

pub mod context;
pub mod error;
pub mod history;
pub mod models;
pub mod orchestrator;
pub mod preview;

pub use context::AppContext;
pub use error::{AppError, AppResult};
pub use history::{HistoryPaginator, HistorySubscription, PageControls, HISTORY_TAG};
pub use models::ModelCatalogService;
pub use orchestrator::{GenerationOrchestrator, SubmissionState, SubmitOutcome};
pub use preview::{render_svg, SpritePreview};
