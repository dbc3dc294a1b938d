//! The operation surface of the remote API.

use async_trait::async_trait;
use spritegen_core::pagination::HistoryParams;
use spritegen_core::types::{
    Generation, GenerationRequest, HistoryPage, ModelCatalog, SpriteSheetRequest, SubmitRequest,
    UploadResponse,
};

use crate::error::ApiError;

/// Typed calls against the generation API.
///
/// The application layer only ever talks to this trait, so tests can
/// substitute an in-memory implementation for [`HttpGateway`].
///
/// [`HttpGateway`]: crate::api::HttpGateway
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    /// `POST /generate`
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, ApiError>;

    /// `POST /generate/sprite-sheet`
    async fn generate_sprite_sheet(
        &self,
        request: &SpriteSheetRequest,
    ) -> Result<Generation, ApiError>;

    /// `POST /upload-reference` (multipart field `file`).
    async fn upload_reference(
        &self,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<UploadResponse, ApiError>;

    /// `GET /history`
    async fn list_history(&self, params: &HistoryParams) -> Result<HistoryPage, ApiError>;

    /// `GET /history/{id}`
    async fn get_generation(&self, id: &str) -> Result<Generation, ApiError>;

    /// `DELETE /history/{id}`
    async fn delete_generation(&self, id: &str) -> Result<(), ApiError>;

    /// `GET /models`
    async fn list_models(&self) -> Result<ModelCatalog, ApiError>;

    /// Download the bytes of a stored image.
    async fn fetch_image(&self, stored_ref: &str) -> Result<Vec<u8>, ApiError>;

    /// Serving URL of a stored image, if the reference has a file name.
    fn image_url(&self, stored_ref: &str) -> Option<String>;

    /// Dispatch a built submission to the matching endpoint.
    async fn submit(&self, request: &SubmitRequest) -> Result<Generation, ApiError> {
        match request {
            SubmitRequest::Image(req) => self.generate(req).await,
            SubmitRequest::SpriteSheet(req) => self.generate_sprite_sheet(req).await,
        }
    }
}
