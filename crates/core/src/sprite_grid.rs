//! Grid overlay geometry for sprite-sheet previews.
//!
//! [`compute_grid_overlay`] is a pure function of the image's intrinsic
//! pixel size and the sprite layout. It is re-run whenever either input
//! changes and its output is never persisted; painting lives in the
//! application crate as a thin adapter over this geometry.

use serde::Serialize;

use crate::types::{SpriteLayout, MAX_SPRITE_DIMENSION};

/// Smallest label font size, in image pixels.
pub const MIN_LABEL_FONT_PX: f64 = 12.0;

/// Label font size as a fraction of the cell width.
pub const LABEL_FONT_CELL_RATIO: f64 = 0.1;

/// Intrinsic (natural) pixel size of a loaded raster image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Vertical,
    Horizontal,
}

/// One interior separator line, spanning the full image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridLine {
    pub orientation: Orientation,
    pub start: Point,
    pub end: Point,
}

/// A frame number centred in its cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameLabel {
    /// 1-based frame number, row-major.
    pub frame: u32,
    pub row: u32,
    pub col: u32,
    pub center: Point,
}

/// Complete overlay for one image/layout pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridOverlay {
    pub image: ImageSize,
    pub cell_width: f64,
    pub cell_height: f64,
    pub lines: Vec<GridLine>,
    pub labels: Vec<FrameLabel>,
    pub font_size: f64,
}

impl GridOverlay {
    pub fn vertical_lines(&self) -> impl Iterator<Item = &GridLine> {
        self.lines
            .iter()
            .filter(|l| l.orientation == Orientation::Vertical)
    }

    pub fn horizontal_lines(&self) -> impl Iterator<Item = &GridLine> {
        self.lines
            .iter()
            .filter(|l| l.orientation == Orientation::Horizontal)
    }

    fn empty(image: ImageSize) -> Self {
        Self {
            image,
            cell_width: 0.0,
            cell_height: 0.0,
            lines: Vec::new(),
            labels: Vec::new(),
            font_size: MIN_LABEL_FONT_PX,
        }
    }
}

/// Label font size for a given cell width.
pub fn label_font_size(cell_width: f64) -> f64 {
    (cell_width * LABEL_FONT_CELL_RATIO).max(MIN_LABEL_FONT_PX)
}

/// Compute separators and frame labels for `layout` over an image of
/// `image` natural pixels.
///
/// - Cells are `width / cols` by `height / rows` (floating point, no
///   pixel snapping).
/// - Separators sit at every interior cell boundary; the outer edge has
///   no border.
/// - Labels `1..=frame_count` are placed row-major and stop once every
///   frame is labelled or the grid runs out of cells.
///
/// A zero-sized image, a layout with zero rows or columns, or one with
/// more than [`MAX_SPRITE_DIMENSION`] rows or columns produces an empty
/// overlay. Layouts read back from the server are not validated.
pub fn compute_grid_overlay(image: ImageSize, layout: &SpriteLayout) -> GridOverlay {
    if image.width == 0 || image.height == 0 {
        return GridOverlay::empty(image);
    }
    let dimensions = 1..=MAX_SPRITE_DIMENSION;
    if !dimensions.contains(&layout.rows) || !dimensions.contains(&layout.cols) {
        return GridOverlay::empty(image);
    }

    let width = f64::from(image.width);
    let height = f64::from(image.height);
    let cell_width = width / f64::from(layout.cols);
    let cell_height = height / f64::from(layout.rows);

    let mut lines = Vec::with_capacity((layout.cols + layout.rows).saturating_sub(2) as usize);
    for i in 1..layout.cols {
        let x = f64::from(i) * cell_width;
        lines.push(GridLine {
            orientation: Orientation::Vertical,
            start: Point { x, y: 0.0 },
            end: Point { x, y: height },
        });
    }
    for j in 1..layout.rows {
        let y = f64::from(j) * cell_height;
        lines.push(GridLine {
            orientation: Orientation::Horizontal,
            start: Point { x: 0.0, y },
            end: Point { x: width, y },
        });
    }

    let label_count = layout.labelled_frames();
    let mut labels = Vec::with_capacity(label_count as usize);
    'rows: for row in 0..layout.rows {
        for col in 0..layout.cols {
            let frame = row * layout.cols + col + 1;
            if frame > label_count {
                break 'rows;
            }
            labels.push(FrameLabel {
                frame,
                row,
                col,
                center: Point {
                    x: f64::from(col) * cell_width + cell_width / 2.0,
                    y: f64::from(row) * cell_height + cell_height / 2.0,
                },
            });
        }
    }

    GridOverlay {
        image,
        cell_width,
        cell_height,
        lines,
        labels,
        font_size: label_font_size(cell_width),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_four_by_four_sheet() {
        let overlay = compute_grid_overlay(ImageSize::new(1024, 1024), &SpriteLayout::new(4, 4, 16));

        let xs: Vec<f64> = overlay.vertical_lines().map(|l| l.start.x).collect();
        let ys: Vec<f64> = overlay.horizontal_lines().map(|l| l.start.y).collect();
        assert_eq!(xs, vec![256.0, 512.0, 768.0]);
        assert_eq!(ys, vec![256.0, 512.0, 768.0]);

        let frames: Vec<u32> = overlay.labels.iter().map(|l| l.frame).collect();
        assert_eq!(frames, (1..=16).collect::<Vec<_>>());
        assert_eq!(overlay.labels[0].center, Point { x: 128.0, y: 128.0 });
        assert_eq!(overlay.labels[4].row, 1);
        assert_eq!(overlay.labels[4].col, 0);
    }

    #[test]
    fn separators_span_the_whole_image() {
        let overlay = compute_grid_overlay(ImageSize::new(800, 600), &SpriteLayout::new(3, 2, 6));
        let vertical: Vec<_> = overlay.vertical_lines().collect();
        assert_eq!(vertical.len(), 1);
        assert_eq!(vertical[0].start, Point { x: 400.0, y: 0.0 });
        assert_eq!(vertical[0].end, Point { x: 400.0, y: 600.0 });

        let horizontal: Vec<_> = overlay.horizontal_lines().collect();
        assert_eq!(horizontal.len(), 2);
        assert_eq!(horizontal[1].end, Point { x: 800.0, y: 400.0 });
    }

    #[test]
    fn cells_beyond_frame_count_are_unlabelled() {
        let overlay = compute_grid_overlay(ImageSize::new(1024, 1024), &SpriteLayout::new(4, 4, 10));
        assert_eq!(overlay.labels.len(), 10);
        let last = overlay.labels.last().unwrap();
        assert_eq!((last.frame, last.row, last.col), (10, 2, 1));
        // Separators do not depend on frame_count.
        assert_eq!(overlay.lines.len(), 6);
    }

    #[test]
    fn frame_count_larger_than_grid_labels_every_cell_once() {
        let overlay = compute_grid_overlay(ImageSize::new(64, 64), &SpriteLayout::new(2, 2, 9));
        let frames: Vec<u32> = overlay.labels.iter().map(|l| l.frame).collect();
        assert_eq!(frames, vec![1, 2, 3, 4]);
    }

    #[test]
    fn non_integer_cells_are_not_snapped() {
        let overlay = compute_grid_overlay(ImageSize::new(1000, 100), &SpriteLayout::new(1, 3, 3));
        assert!((overlay.cell_width - 333.333_333).abs() < 1e-3);
        let xs: Vec<f64> = overlay.vertical_lines().map(|l| l.start.x).collect();
        assert!((xs[1] - 666.666_666).abs() < 1e-3);
        assert!(overlay.horizontal_lines().next().is_none());
    }

    #[test]
    fn font_size_scales_with_cell_width() {
        let small = compute_grid_overlay(ImageSize::new(256, 256), &SpriteLayout::new(4, 4, 16));
        assert_eq!(small.font_size, MIN_LABEL_FONT_PX);

        let large = compute_grid_overlay(ImageSize::new(2048, 2048), &SpriteLayout::new(4, 4, 16));
        assert_eq!(large.font_size, 51.2);
    }

    #[test]
    fn single_cell_layout_has_no_separators() {
        let overlay = compute_grid_overlay(ImageSize::new(512, 512), &SpriteLayout::new(1, 1, 1));
        assert!(overlay.lines.is_empty());
        assert_eq!(overlay.labels.len(), 1);
        assert_eq!(overlay.labels[0].center, Point { x: 256.0, y: 256.0 });
    }

    #[test]
    fn degenerate_inputs_yield_empty_overlay() {
        let zero_image = compute_grid_overlay(ImageSize::new(0, 512), &SpriteLayout::new(4, 4, 16));
        assert!(zero_image.lines.is_empty() && zero_image.labels.is_empty());

        let zero_cols = compute_grid_overlay(ImageSize::new(512, 512), &SpriteLayout::new(4, 0, 16));
        assert!(zero_cols.lines.is_empty() && zero_cols.labels.is_empty());
    }

    #[test]
    fn oversized_layout_yields_empty_overlay() {
        let image = ImageSize::new(1024, 1024);
        for layout in [
            SpriteLayout::new(u32::MAX, 1, 1),
            SpriteLayout::new(1, u32::MAX, u32::MAX),
            SpriteLayout::new(u32::MAX, u32::MAX, 16),
            SpriteLayout::new(MAX_SPRITE_DIMENSION + 1, 4, 16),
        ] {
            let overlay = compute_grid_overlay(image, &layout);
            assert!(overlay.lines.is_empty() && overlay.labels.is_empty(), "{layout:?}");
        }

        let largest = SpriteLayout::new(MAX_SPRITE_DIMENSION, MAX_SPRITE_DIMENSION, u32::MAX);
        let overlay = compute_grid_overlay(image, &largest);
        assert_eq!(overlay.labels.len(), (MAX_SPRITE_DIMENSION * MAX_SPRITE_DIMENSION) as usize);
    }

    #[test]
    fn identical_inputs_give_identical_geometry() {
        let layout = SpriteLayout::new(3, 5, 12);
        let a = compute_grid_overlay(ImageSize::new(1500, 900), &layout);
        let b = compute_grid_overlay(ImageSize::new(1500, 900), &layout);
        assert_eq!(a, b);
    }
}
