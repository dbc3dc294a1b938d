//! Sprite-sheet preview: the reactive wrapper around
//! [`compute_grid_overlay`] and an SVG painter for its output.
//!
//! The overlay is recomputed on every input change and never cached
//! across changes. Painting is kept separate so the geometry stays a
//! pure function of `(image size, layout)`.

use spritegen_client::GenerationGateway;
use spritegen_core::error::CoreError;
use spritegen_core::images::image_size_from_bytes;
use spritegen_core::sprite_grid::{compute_grid_overlay, GridOverlay, ImageSize};
use spritegen_core::types::{Generation, SpriteLayout};

use crate::error::AppResult;

pub const GRID_STROKE: &str = "rgba(168,85,247,0.6)";
pub const GRID_STROKE_WIDTH: u32 = 2;
pub const LABEL_FILL: &str = "rgba(168,85,247,0.8)";

#[derive(Debug, Clone, PartialEq)]
pub struct SpritePreview {
    layout: Option<SpriteLayout>,
    image: Option<ImageSize>,
    show_grid: bool,
    overlay: Option<GridOverlay>,
}

impl Default for SpritePreview {
    fn default() -> Self {
        Self {
            layout: None,
            image: None,
            show_grid: true,
            overlay: None,
        }
    }
}

impl SpritePreview {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `generation`. The image size is unknown until the new image
    /// has loaded, so the overlay is cleared until then.
    pub fn set_generation(&mut self, generation: &Generation) {
        self.layout = generation.overlay_layout();
        self.image = None;
        self.recompute();
    }

    pub fn on_image_loaded(&mut self, size: ImageSize) {
        self.image = Some(size);
        self.recompute();
    }

    pub fn set_layout(&mut self, layout: Option<SpriteLayout>) {
        self.layout = layout;
        self.recompute();
    }

    pub fn set_show_grid(&mut self, show: bool) {
        self.show_grid = show;
        self.recompute();
    }

    pub fn toggle_grid(&mut self) {
        self.set_show_grid(!self.show_grid);
    }

    pub fn show_grid(&self) -> bool {
        self.show_grid
    }

    /// Current overlay; `None` while the grid is hidden, there is no
    /// layout, or the image has not loaded.
    pub fn overlay(&self) -> Option<&GridOverlay> {
        self.overlay.as_ref()
    }

    /// Download the generation's output image, read its intrinsic size
    /// and recompute. Returns the image bytes.
    pub async fn load_output(
        &mut self,
        gateway: &dyn GenerationGateway,
        generation: &Generation,
    ) -> AppResult<Vec<u8>> {
        self.set_generation(generation);
        let stored_ref = generation
            .output_image_path
            .as_deref()
            .ok_or_else(|| CoreError::NotFound {
                entity: "output image",
                id: generation.id.clone(),
            })?;
        let bytes = gateway.fetch_image(stored_ref).await?;
        self.on_image_loaded(image_size_from_bytes(&bytes)?);
        Ok(bytes)
    }

    fn recompute(&mut self) {
        self.overlay = match (self.show_grid, self.layout, self.image) {
            (true, Some(layout), Some(image)) => Some(compute_grid_overlay(image, &layout)),
            _ => None,
        };
    }
}

/// Paint `overlay` as a standalone SVG sized to the image's natural
/// pixels. `background_href`, when given, is drawn underneath.
pub fn render_svg(overlay: &GridOverlay, background_href: Option<&str>) -> String {
    let (w, h) = (overlay.image.width, overlay.image.height);
    let mut lines = vec![format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#
    )];
    if let Some(href) = background_href {
        lines.push(format!(
            r#"  <image href="{}" x="0" y="0" width="{w}" height="{h}"/>"#,
            escape_attr(href)
        ));
    }
    lines.extend(overlay.lines.iter().map(|line| {
        format!(
            r#"  <line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{GRID_STROKE}" stroke-width="{GRID_STROKE_WIDTH}"/>"#,
            line.start.x, line.start.y, line.end.x, line.end.y
        )
    }));
    lines.extend(overlay.labels.iter().map(|label| {
        format!(
            r#"  <text x="{}" y="{}" font-size="{}" font-family="sans-serif" fill="{LABEL_FILL}" text-anchor="middle" dominant-baseline="central">{}</text>"#,
            label.center.x, label.center.y, overlay.font_size, label.frame
        )
    }));
    lines.push("</svg>\n".to_string());
    lines.join("\n")
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
