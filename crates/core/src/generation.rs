//! Generation form state, submission gating and request building.
//!
//! The form is plain data; [`GenerationForm::build_request`] is the only
//! way to turn it into a wire request, and it refuses (before any network
//! activity) whenever the prompt is blank or no model is selected.

use base64::Engine;
use validator::Validate;

use crate::error::CoreError;
use crate::types::{GenerationRequest, ModelInfo, Provider, SpriteLayout, SpriteSheetRequest, SubmitRequest};

// ---------------------------------------------------------------------------
// Form defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_ASPECT_RATIO: &str = "1:1";
pub const DEFAULT_IMAGE_SIZE: &str = "1024x1024";

/// Aspect ratios offered by the form.
pub const ASPECT_RATIOS: &[&str] = &["1:1", "16:9", "9:16", "4:3", "3:4"];

/// Output sizes offered by the form.
pub const IMAGE_SIZES: &[&str] = &["1024x1024", "1536x1536", "2048x2048"];

/// Largest frame count the form accepts (a fully used 32x32 grid).
pub const MAX_FRAME_COUNT: u32 = 32 * 32;

/// Clamp a rows/cols form value into `1..=32`.
pub fn clamp_sprite_dimension(value: u32) -> u32 {
    value.clamp(1, crate::types::MAX_SPRITE_DIMENSION)
}

/// Clamp a frame-count form value into `1..=MAX_FRAME_COUNT`.
pub fn clamp_frame_count(value: u32) -> u32 {
    value.clamp(1, MAX_FRAME_COUNT)
}

// ---------------------------------------------------------------------------
// Form state
// ---------------------------------------------------------------------------

/// Everything the user has entered on the generation surface.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationForm {
    pub prompt: String,
    pub negative_prompt: String,
    /// Selected model id. `None` until the user picks one.
    pub model: Option<String>,
    pub provider: Provider,
    pub aspect_ratio: String,
    pub image_size: String,
    pub transparent_bg: bool,
    pub is_sprite_sheet: bool,
    pub sprite_layout: SpriteLayout,
    /// Reference image, already base64-encoded.
    pub reference_image: Option<String>,
}

impl Default for GenerationForm {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            negative_prompt: String::new(),
            model: None,
            provider: Provider::default(),
            aspect_ratio: DEFAULT_ASPECT_RATIO.to_string(),
            image_size: DEFAULT_IMAGE_SIZE.to_string(),
            transparent_bg: false,
            is_sprite_sheet: false,
            sprite_layout: SpriteLayout::default(),
            reference_image: None,
        }
    }
}

impl GenerationForm {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Select a catalog model. The provider follows the model.
    pub fn select_model(&mut self, model: &ModelInfo) {
        self.model = Some(model.id.clone());
        if let Some(provider) = model.provider_kind() {
            self.provider = provider;
        } else {
            tracing::warn!(model = %model.id, provider = %model.provider, "Unknown provider on model");
        }
    }

    /// Update the sprite layout, clamping each field to the form bounds.
    pub fn set_sprite_layout(&mut self, rows: u32, cols: u32, frame_count: u32) {
        self.sprite_layout = SpriteLayout::new(
            clamp_sprite_dimension(rows),
            clamp_sprite_dimension(cols),
            clamp_frame_count(frame_count),
        );
    }

    /// Attach raw reference-image bytes, encoding them as base64.
    ///
    /// Bytes that are not a recognised raster format are rejected.
    pub fn attach_reference_image(&mut self, bytes: &[u8]) -> Result<(), CoreError> {
        self.reference_image = Some(encode_reference_image(bytes)?);
        Ok(())
    }

    pub fn clear_reference_image(&mut self) {
        self.reference_image = None;
    }

    /// Whether the submit control should be enabled (ignoring any
    /// in-flight submission, which the orchestrator tracks).
    pub fn can_submit(&self) -> bool {
        self.validate_submission().is_ok()
    }

    /// Check the local preconditions for a submission.
    pub fn validate_submission(&self) -> Result<(), CoreError> {
        if self.prompt.trim().is_empty() {
            return Err(CoreError::Validation("Prompt must not be empty".to_string()));
        }
        match self.model.as_deref() {
            Some(model) if !model.trim().is_empty() => {}
            _ => return Err(CoreError::Validation("A model must be selected".to_string())),
        }
        if self.is_sprite_sheet {
            self.sprite_layout
                .validate()
                .map_err(|e| CoreError::Validation(format!("Invalid sprite layout: {e}")))?;
        }
        Ok(())
    }

    /// Build the wire request for this form.
    pub fn build_request(&self) -> Result<SubmitRequest, CoreError> {
        self.validate_submission()?;

        let negative_prompt = Some(self.negative_prompt.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let base = GenerationRequest {
            prompt: self.prompt.trim().to_string(),
            negative_prompt,
            model: self.model.clone().unwrap_or_default(),
            provider: self.provider,
            aspect_ratio: Some(self.aspect_ratio.clone()),
            image_size: Some(self.image_size.clone()),
            transparent_bg: Some(self.transparent_bg),
            reference_image: self.reference_image.clone(),
        };

        if !self.is_sprite_sheet {
            return Ok(SubmitRequest::Image(base));
        }

        let layout = self.sprite_layout;
        if layout.frame_count > layout.cell_count() {
            tracing::warn!(
                rows = layout.rows,
                cols = layout.cols,
                frame_count = layout.frame_count,
                "Sprite layout has more frames than cells; forwarding unchanged",
            );
        }
        Ok(SubmitRequest::SpriteSheet(SpriteSheetRequest::new(base, layout)))
    }
}

// ---------------------------------------------------------------------------
// Reference images
// ---------------------------------------------------------------------------

/// Verify `bytes` look like an image and encode them as standard base64.
pub fn encode_reference_image(bytes: &[u8]) -> Result<String, CoreError> {
    ensure_image_bytes(bytes)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

/// Reject byte buffers that are not a recognised raster format.
pub fn ensure_image_bytes(bytes: &[u8]) -> Result<image::ImageFormat, CoreError> {
    image::guess_format(bytes)
        .map_err(|_| CoreError::Validation("Reference file must be an image".to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
