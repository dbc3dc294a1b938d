#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Notify;

use spritegen_app::AppContext;
use spritegen_client::{ApiError, ClientConfig, GenerationGateway};
use spritegen_core::images;
use spritegen_core::pagination::HistoryParams;
use spritegen_core::types::{
    Generation, GenerationRequest, GenerationStatus, HistoryPage, ModelCatalog, ModelInfo,
    SpriteSheetRequest, UploadResponse,
};

/// Build a completed generation record.
pub fn generation(id: &str, prompt: &str, provider: &str) -> Generation {
    let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
    Generation {
        id: id.to_string(),
        prompt: prompt.to_string(),
        negative_prompt: None,
        model: "gemini-2.5-flash-image".to_string(),
        provider: provider.to_string(),
        width: Some(1024),
        height: Some(1024),
        aspect_ratio: Some("1:1".to_string()),
        image_size: Some("1024x1024".to_string()),
        transparent_bg: false,
        is_sprite_sheet: false,
        sprite_layout: None,
        reference_image_path: None,
        output_image_path: Some(format!("public/outputs/{id}.png")),
        thumbnail_path: Some(format!("public/outputs/{id}_thumb.png")),
        status: GenerationStatus::Completed,
        error_message: None,
        metadata_json: None,
        created_at: at,
        updated_at: at,
    }
}

pub fn model(id: &str, provider: &str) -> ModelInfo {
    ModelInfo {
        id: id.to_string(),
        name: id.to_string(),
        provider: provider.to_string(),
    }
}

/// In-memory stand-in for the remote API.
///
/// Keeps a server-side list of generations (newest first), records every
/// call by operation name, and can be told to fail or to hold generation
/// requests until released.
#[derive(Default)]
pub struct FakeGateway {
    pub generations: Mutex<Vec<Generation>>,
    pub catalog: Mutex<ModelCatalog>,
    pub images: Mutex<HashMap<String, Vec<u8>>>,
    pub calls: Mutex<Vec<String>>,
    pub history_params: Mutex<Vec<HistoryParams>>,
    pub generate_error: Mutex<Option<ApiError>>,
    pub generate_gate: Mutex<Option<Arc<Notify>>>,
    next_id: Mutex<u32>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_generations(items: Vec<Generation>) -> Arc<Self> {
        let gateway = Self::default();
        *gateway.generations.lock().unwrap() = items;
        Arc::new(gateway)
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == operation)
            .count()
    }

    pub fn last_history_params(&self) -> Option<HistoryParams> {
        self.history_params.lock().unwrap().last().cloned()
    }

    pub fn fail_generate_with(&self, err: ApiError) {
        *self.generate_error.lock().unwrap() = Some(err);
    }

    /// Hold every generate call until the returned `Notify` is signalled.
    pub fn hold_generate(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.generate_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    fn record(&self, operation: &str) {
        self.calls.lock().unwrap().push(operation.to_string());
    }

    async fn create(&self, base: &GenerationRequest, sprite: Option<&SpriteSheetRequest>) -> Result<Generation, ApiError> {
        let gate = self.generate_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(err) = self.generate_error.lock().unwrap().clone() {
            return Err(err);
        }

        let id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            format!("gen_{next}")
        };
        let mut created = generation(&id, &base.prompt, base.provider.as_str());
        created.model = base.model.clone();
        created.negative_prompt = base.negative_prompt.clone();
        if let Some(sprite) = sprite {
            created.is_sprite_sheet = true;
            created.sprite_layout = Some(sprite.sprite_layout);
        }
        self.generations.lock().unwrap().insert(0, created.clone());
        Ok(created)
    }
}

#[async_trait]
impl GenerationGateway for FakeGateway {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, ApiError> {
        self.record("generate");
        self.create(request, None).await
    }

    async fn generate_sprite_sheet(
        &self,
        request: &SpriteSheetRequest,
    ) -> Result<Generation, ApiError> {
        self.record("generate_sprite_sheet");
        self.create(&request.base, Some(request)).await
    }

    async fn upload_reference(
        &self,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<UploadResponse, ApiError> {
        self.record("upload_reference");
        let path = format!("public/uploads/{filename}");
        self.images.lock().unwrap().insert(path.clone(), bytes);
        Ok(UploadResponse {
            path,
            filename: filename.to_string(),
        })
    }

    async fn list_history(&self, params: &HistoryParams) -> Result<HistoryPage, ApiError> {
        self.record("list_history");
        self.history_params.lock().unwrap().push(params.clone());

        let matching: Vec<Generation> = self
            .generations
            .lock()
            .unwrap()
            .iter()
            .filter(|g| {
                params
                    .filters
                    .search
                    .as_deref()
                    .map_or(true, |s| g.prompt.contains(s))
            })
            .filter(|g| {
                params
                    .filters
                    .provider
                    .map_or(true, |p| g.provider == p.as_str())
            })
            .cloned()
            .collect();

        let total = matching.len() as u64;
        let page_size = params.page_size.max(1);
        let total_pages = matching.len().div_ceil(page_size as usize) as u32;
        let items = matching
            .into_iter()
            .skip(((params.page.max(1) - 1) * page_size) as usize)
            .take(page_size as usize)
            .collect();

        Ok(HistoryPage {
            items,
            total_count: total,
            page: params.page,
            page_size,
            total_pages,
        })
    }

    async fn get_generation(&self, id: &str) -> Result<Generation, ApiError> {
        self.record("get_generation");
        self.generations
            .lock()
            .unwrap()
            .iter()
            .find(|g| g.id == id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound("Generation not found".into()))
    }

    async fn delete_generation(&self, id: &str) -> Result<(), ApiError> {
        self.record("delete_generation");
        let mut generations = self.generations.lock().unwrap();
        let before = generations.len();
        generations.retain(|g| g.id != id);
        if generations.len() == before {
            return Err(ApiError::NotFound("Generation not found".into()));
        }
        Ok(())
    }

    async fn list_models(&self) -> Result<ModelCatalog, ApiError> {
        self.record("list_models");
        Ok(self.catalog.lock().unwrap().clone())
    }

    async fn fetch_image(&self, stored_ref: &str) -> Result<Vec<u8>, ApiError> {
        self.record("fetch_image");
        let name = images::file_name(stored_ref).unwrap_or_default().to_string();
        self.images
            .lock()
            .unwrap()
            .get(&name)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(name))
    }

    fn image_url(&self, stored_ref: &str) -> Option<String> {
        images::image_url("/api", stored_ref)
    }
}

/// Wire a context around `gateway` with default configuration.
pub fn context(gateway: &Arc<FakeGateway>) -> AppContext {
    AppContext::new(
        Arc::clone(gateway) as Arc<dyn GenerationGateway>,
        ClientConfig::default(),
    )
}
