//! Wire-level data model shared by the gateway, the cache and the UI
//! surfaces.
//!
//! Field names follow the remote API's JSON exactly; the client only
//! ever holds read-only snapshots of server-owned records.

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Server-assigned generation identifiers are UUID strings.
pub type GenerationId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Image generation backend a model belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Gemini,
    OpenRouter,
}

impl Provider {
    /// Value used on the wire and in history filters.
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::OpenRouter => "openrouter",
        }
    }

    /// Human-facing label used when grouping models.
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::Gemini => "Gemini",
            Provider::OpenRouter => "OpenRouter",
        }
    }

    /// Parse a wire value. Unknown providers yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "gemini" => Some(Provider::Gemini),
            "openrouter" => Some(Provider::OpenRouter),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a server-side generation.
///
/// Monotonic per id in the happy path (`pending -> generating ->
/// completed | failed`), but the client never mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Pending,
    Generating,
    Completed,
    Failed,
}

impl GenerationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationStatus::Pending => "pending",
            GenerationStatus::Generating => "generating",
            GenerationStatus::Completed => "completed",
            GenerationStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Sprite layout
// ---------------------------------------------------------------------------

/// Upper bound for rows/columns accepted by the form.
pub const MAX_SPRITE_DIMENSION: u32 = 32;

/// Grid layout of a sprite sheet (`sprite_config` on the wire).
///
/// `frame_count <= rows * cols` is not validated: the layout is forwarded
/// as-is and the overlay stops labelling once every cell is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct SpriteLayout {
    #[validate(range(min = 1, max = 32))]
    pub rows: u32,
    #[validate(range(min = 1, max = 32))]
    pub cols: u32,
    #[validate(range(min = 1))]
    pub frame_count: u32,
}

impl SpriteLayout {
    pub fn new(rows: u32, cols: u32, frame_count: u32) -> Self {
        Self {
            rows,
            cols,
            frame_count,
        }
    }

    /// Number of cells in the grid.
    pub fn cell_count(&self) -> u32 {
        self.rows.saturating_mul(self.cols)
    }

    /// Number of cells that will carry a frame label.
    pub fn labelled_frames(&self) -> u32 {
        self.frame_count.min(self.cell_count())
    }
}

impl Default for SpriteLayout {
    fn default() -> Self {
        Self::new(4, 4, 16)
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Body of `POST /generate`. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    pub model: String,
    pub provider: Provider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transparent_bg: Option<bool>,
    /// Base64 (standard alphabet, no data-URL prefix).
    #[serde(
        rename = "reference_image_b64",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reference_image: Option<String>,
}

/// Body of `POST /generate/sprite-sheet`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteSheetRequest {
    #[serde(flatten)]
    pub base: GenerationRequest,
    pub is_sprite_sheet: bool,
    #[serde(rename = "sprite_config")]
    pub sprite_layout: SpriteLayout,
}

impl SpriteSheetRequest {
    pub fn new(base: GenerationRequest, sprite_layout: SpriteLayout) -> Self {
        Self {
            base,
            is_sprite_sheet: true,
            sprite_layout,
        }
    }
}

/// Either kind of submission, as produced from form state.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitRequest {
    Image(GenerationRequest),
    SpriteSheet(SpriteSheetRequest),
}

impl SubmitRequest {
    pub fn prompt(&self) -> &str {
        match self {
            SubmitRequest::Image(req) => &req.prompt,
            SubmitRequest::SpriteSheet(req) => &req.base.prompt,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            SubmitRequest::Image(req) => &req.model,
            SubmitRequest::SpriteSheet(req) => &req.base.model,
        }
    }

    pub fn is_sprite_sheet(&self) -> bool {
        matches!(self, SubmitRequest::SpriteSheet(_))
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Server-owned generation record, echoed back by every generation and
/// history endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub id: GenerationId,
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    pub model: String,
    pub provider: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub image_size: Option<String>,
    #[serde(default)]
    pub transparent_bg: bool,
    #[serde(default)]
    pub is_sprite_sheet: bool,
    #[serde(rename = "sprite_config", default)]
    pub sprite_layout: Option<SpriteLayout>,
    #[serde(default)]
    pub reference_image_path: Option<String>,
    #[serde(default)]
    pub output_image_path: Option<String>,
    #[serde(default)]
    pub thumbnail_path: Option<String>,
    pub status: GenerationStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub metadata_json: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Generation {
    /// Sprite layout to overlay, present only for sprite-sheet results.
    pub fn overlay_layout(&self) -> Option<SpriteLayout> {
        if self.is_sprite_sheet {
            self.sprite_layout
        } else {
            None
        }
    }

    /// Only finished generations with an output image can be opened in
    /// the detail view.
    pub fn is_viewable(&self) -> bool {
        self.status == GenerationStatus::Completed && self.output_image_path.is_some()
    }
}

/// One page of `GET /history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub items: Vec<Generation>,
    #[serde(rename = "total")]
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl HistoryPage {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Catalog entry returned by `GET /models`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub provider: String,
}

impl ModelInfo {
    pub fn provider_kind(&self) -> Option<Provider> {
        Provider::parse(&self.provider)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCatalog {
    pub models: Vec<ModelInfo>,
}

impl ModelCatalog {
    pub fn find(&self, id: &str) -> Option<&ModelInfo> {
        self.models.iter().find(|m| m.id == id)
    }

    /// Models grouped under their provider's display name, in the order
    /// each provider first appears in the catalog.
    pub fn grouped_by_provider(&self) -> Vec<(String, Vec<&ModelInfo>)> {
        let mut groups: Vec<(String, Vec<&ModelInfo>)> = Vec::new();
        for model in &self.models {
            let label = model
                .provider_kind()
                .map(|p| p.display_name().to_string())
                .unwrap_or_else(|| model.provider.clone());
            match groups.iter_mut().find(|(name, _)| *name == label) {
                Some((_, members)) => members.push(model),
                None => groups.push((label, vec![model])),
            }
        }
        groups
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Response of `POST /upload-reference`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub path: String,
    pub filename: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn generation_json() -> serde_json::Value {
        serde_json::json!({
            "id": "7f9c0e4a-1111-4c2b-9d3e-000000000001",
            "prompt": "a knight walking",
            "negative_prompt": null,
            "model": "gemini-2.0-flash",
            "provider": "gemini",
            "width": 1024,
            "height": 1024,
            "aspect_ratio": "1:1",
            "image_size": "1024x1024",
            "transparent_bg": true,
            "is_sprite_sheet": true,
            "sprite_config": {"rows": 4, "cols": 4, "frame_count": 10},
            "reference_image_path": null,
            "output_image_path": "public/outputs/gen_abc.png",
            "thumbnail_path": "public/outputs/gen_abc_thumb.png",
            "status": "completed",
            "error_message": null,
            "metadata_json": {"seed": 1},
            "created_at": "2025-01-01T10:00:00Z",
            "updated_at": "2025-01-01T10:00:05Z"
        })
    }

    #[test]
    fn generation_deserializes_from_wire_shape() {
        let gen: Generation = serde_json::from_value(generation_json()).unwrap();
        assert_eq!(gen.status, GenerationStatus::Completed);
        assert_eq!(gen.sprite_layout, Some(SpriteLayout::new(4, 4, 10)));
        assert_eq!(gen.overlay_layout(), Some(SpriteLayout::new(4, 4, 10)));
        assert!(gen.is_viewable());
    }

    #[test]
    fn overlay_layout_absent_for_plain_images() {
        let mut json = generation_json();
        json["is_sprite_sheet"] = serde_json::json!(false);
        let gen: Generation = serde_json::from_value(json).unwrap();
        assert_eq!(gen.overlay_layout(), None);
    }

    #[test]
    fn pending_generation_is_not_viewable() {
        let mut json = generation_json();
        json["status"] = serde_json::json!("pending");
        let gen: Generation = serde_json::from_value(json).unwrap();
        assert!(!gen.is_viewable());
    }

    #[test]
    fn history_page_reads_total_field() {
        let page: HistoryPage = serde_json::from_value(serde_json::json!({
            "items": [],
            "total": 0,
            "page": 1,
            "page_size": 12,
            "total_pages": 0
        }))
        .unwrap();
        assert_eq!(page.total_count, 0);
        assert!(page.is_empty());
    }

    #[test]
    fn sprite_request_flattens_base_fields() {
        let base = GenerationRequest {
            prompt: "slime".into(),
            negative_prompt: None,
            model: "m".into(),
            provider: Provider::OpenRouter,
            aspect_ratio: Some("1:1".into()),
            image_size: None,
            transparent_bg: Some(false),
            reference_image: Some("AAAA".into()),
        };
        let req = SpriteSheetRequest::new(base, SpriteLayout::new(2, 3, 6));
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["prompt"], "slime");
        assert_eq!(json["provider"], "openrouter");
        assert_eq!(json["reference_image_b64"], "AAAA");
        assert_eq!(json["is_sprite_sheet"], true);
        assert_eq!(json["sprite_config"]["cols"], 3);
        assert!(json.get("negative_prompt").is_none());
        assert!(json.get("image_size").is_none());
    }

    #[test]
    fn provider_parse_round_trips_known_values() {
        assert_eq!(Provider::parse("gemini"), Some(Provider::Gemini));
        assert_eq!(Provider::parse("openrouter"), Some(Provider::OpenRouter));
        assert_eq!(Provider::parse("dalle"), None);
        assert_eq!(Provider::OpenRouter.display_name(), "OpenRouter");
    }

    #[test]
    fn catalog_groups_keep_first_seen_order() {
        let model = |id: &str, provider: &str| ModelInfo {
            id: id.into(),
            name: id.to_uppercase(),
            provider: provider.into(),
        };
        let catalog = ModelCatalog {
            models: vec![
                model("or-1", "openrouter"),
                model("gm-1", "gemini"),
                model("or-2", "openrouter"),
            ],
        };

        let groups = catalog.grouped_by_provider();
        let names: Vec<&str> = groups.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["OpenRouter", "Gemini"]);
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(catalog.find("gm-1").map(|m| m.name.as_str()), Some("GM-1"));
        assert!(catalog.find("missing").is_none());
    }

    #[test]
    fn layout_labels_never_exceed_cells() {
        assert_eq!(SpriteLayout::new(2, 2, 9).labelled_frames(), 4);
        assert_eq!(SpriteLayout::new(4, 4, 10).labelled_frames(), 10);
    }

    #[test]
    fn layout_validation_rejects_zero_and_oversized_dimensions() {
        assert!(SpriteLayout::new(4, 4, 16).validate().is_ok());
        assert!(SpriteLayout::new(0, 4, 16).validate().is_err());
        assert!(SpriteLayout::new(4, 33, 16).validate().is_err());
        assert!(SpriteLayout::new(4, 4, 0).validate().is_err());
        // Over-full layouts pass through.
        assert!(SpriteLayout::new(2, 2, 9).validate().is_ok());
    }
}
