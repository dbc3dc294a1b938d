//! REST client for the generation API.
//!
//! Wraps the HTTP endpoints (generation, sprite sheets, reference
//! uploads, history, models, image serving) using [`reqwest`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use spritegen_core::generation::ensure_image_bytes;
use spritegen_core::images;
use spritegen_core::pagination::HistoryParams;
use spritegen_core::types::{
    Generation, GenerationRequest, HistoryPage, ModelCatalog, SpriteSheetRequest, UploadResponse,
};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::gateway::GenerationGateway;

/// HTTP client for one API deployment.
pub struct HttpGateway {
    client: reqwest::Client,
    api_url: String,
}

impl HttpGateway {
    /// Create a gateway whose every request carries the configured
    /// transport deadline.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::with_client(client, config.api_url.clone()))
    }

    /// Create a gateway reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, mapping failures
    /// through [`ApiError::from_status`].
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(status = status.as_u16(), "API returned an error status");
            return Err(ApiError::from_status(status.as_u16(), &body));
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    ///
    /// A body that starts with a markup declaration is reported as
    /// [`ApiError::HtmlResponse`] instead of a parse failure.
    async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        let body = response.text().await?;
        if is_markup(body.as_bytes()) {
            tracing::error!("API returned HTML instead of JSON");
            return Err(ApiError::HtmlResponse);
        }
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

/// Whether a body looks like an HTML document rather than API output.
fn is_markup(body: &[u8]) -> bool {
    body.trim_ascii_start().starts_with(b"<!")
}

#[async_trait]
impl GenerationGateway for HttpGateway {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, ApiError> {
        let response = self
            .client
            .post(self.url("/generate"))
            .json(request)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn generate_sprite_sheet(
        &self,
        request: &SpriteSheetRequest,
    ) -> Result<Generation, ApiError> {
        let response = self
            .client
            .post(self.url("/generate/sprite-sheet"))
            .json(request)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn upload_reference(
        &self,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<UploadResponse, ApiError> {
        let mime = ensure_image_bytes(&bytes)
            .map(|format| format.to_mime_type())
            .unwrap_or("application/octet-stream");
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.url("/upload-reference"))
            .multipart(form)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn list_history(&self, params: &HistoryParams) -> Result<HistoryPage, ApiError> {
        let response = self
            .client
            .get(self.url("/history"))
            .query(&params.query_pairs())
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn get_generation(&self, id: &str) -> Result<Generation, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/history/{id}")))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn delete_generation(&self, id: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.url(&format!("/history/{id}")))
            .send()
            .await?;

        Self::check_status(response).await
    }

    async fn list_models(&self) -> Result<ModelCatalog, ApiError> {
        let response = self.client.get(self.url("/models")).send().await?;

        Self::parse_response(response).await
    }

    async fn fetch_image(&self, stored_ref: &str) -> Result<Vec<u8>, ApiError> {
        let url = self
            .image_url(stored_ref)
            .ok_or_else(|| ApiError::NotFound(format!("no file name in {stored_ref:?}")))?;

        let response = self.client.get(url).send().await?;
        let bytes = Self::ensure_success(response).await?.bytes().await?;
        if is_markup(&bytes) {
            return Err(ApiError::HtmlResponse);
        }
        Ok(bytes.to_vec())
    }

    fn image_url(&self, stored_ref: &str) -> Option<String> {
        images::image_url(&self.api_url, stored_ref)
    }
}
