//! Helpers for stored image references.
//!
//! The server stores paths such as `public/outputs/gen_ab12.png`; images
//! are served from a fixed prefix using only the file name.

use std::io::Cursor;

use crate::error::CoreError;
use crate::sprite_grid::ImageSize;

/// Path, relative to the API base URL, that serves generated images.
pub const OUTPUTS_PREFIX: &str = "images/outputs";

/// Fallback name when a generation has no output path.
pub const DEFAULT_DOWNLOAD_NAME: &str = "image.png";

/// Strip directory components from a stored reference.
///
/// Both `/` and `\` separators are treated as directory boundaries.
/// Returns `None` when nothing remains (e.g. a trailing separator).
pub fn file_name(stored_ref: &str) -> Option<&str> {
    stored_ref
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
}

/// Serving URL for a stored image reference.
///
/// # Examples
///
/// ```
/// use spritegen_core::images::image_url;
/// assert_eq!(
///     image_url("http://localhost:8000/api/", "public/outputs/gen_1.png").as_deref(),
///     Some("http://localhost:8000/api/images/outputs/gen_1.png")
/// );
/// ```
pub fn image_url(api_url: &str, stored_ref: &str) -> Option<String> {
    let name = file_name(stored_ref)?;
    Some(format!(
        "{}/{OUTPUTS_PREFIX}/{name}",
        api_url.trim_end_matches('/')
    ))
}

/// Name to save a downloaded output under.
pub fn download_filename(output_ref: Option<&str>) -> String {
    output_ref
        .and_then(file_name)
        .unwrap_or(DEFAULT_DOWNLOAD_NAME)
        .to_string()
}

/// Read the intrinsic pixel size from encoded image bytes.
///
/// Only the header is decoded.
pub fn image_size_from_bytes(bytes: &[u8]) -> Result<ImageSize, CoreError> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CoreError::Validation(format!("Unreadable image: {e}")))?;
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| CoreError::Validation(format!("Unreadable image: {e}")))?;
    Ok(ImageSize::new(width, height))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
