//! Layout planning for the 3:4 spotlight canvas.
//!
//! Pure arithmetic: given source dimensions, decide the crop box, the border
//! and corner metrics, and the black canvas the bordered clip is pasted on.

use serde::{Deserialize, Serialize};

/// Target width/height ratio of both the crop and the canvas.
pub const TARGET_RATIO: f64 = 3.0 / 4.0;

/// Sources within this distance of the target ratio are not cropped.
pub const RATIO_TOLERANCE: f64 = 0.01;

/// Canvas height relative to the cropped content height.
const CANVAS_HEIGHT_FACTOR: f64 = 1.2;

/// Layout of one source on the spotlight canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryPlan {
    pub crop_width: u32,
    pub crop_height: u32,
    pub crop_x: u32,
    pub crop_y: u32,
    pub border_radius: u32,
    pub border_thickness: u32,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub paste_x: u32,
    pub paste_y: u32,
}

impl GeometryPlan {
    /// Width of the crop plus the border on both sides.
    pub fn bordered_width(&self) -> u32 {
        self.crop_width + 2 * self.border_thickness
    }

    /// Height of the crop plus the border on both sides.
    pub fn bordered_height(&self) -> u32 {
        self.crop_height + 2 * self.border_thickness
    }

    /// Whether the source was already close enough to 3:4 to skip cropping.
    pub fn is_uncropped(&self, width: u32, height: u32) -> bool {
        self.crop_width == even(width) && self.crop_height == even(height)
    }
}

fn even(value: u32) -> u32 {
    value - value % 2
}

/// Rounds `height` to the nearest multiple of four (ties to even).
fn quantize_height(height: f64) -> u32 {
    ((height / 4.0).round_ties_even() * 4.0) as u32
}

/// Computes the crop box, border metrics, and canvas for a `width`×`height`
/// source.
///
/// Sources wider than 3:4 are cropped to a horizontally centered box. Sources
/// taller than 3:4 keep their top rows (`crop_y` is always 0).
pub fn plan_geometry(width: u32, height: u32) -> GeometryPlan {
    debug_assert!(width > 0 && height > 0, "dimensions must be positive");

    let ratio = width as f64 / height as f64;

    let (crop_width, crop_height, crop_x) = if (ratio - TARGET_RATIO).abs() < RATIO_TOLERANCE {
        (width, height, 0)
    } else if ratio > TARGET_RATIO {
        let crop_width = (height as f64 * TARGET_RATIO) as u32;
        (crop_width, height, (width - crop_width) / 2)
    } else {
        (width, (width as f64 / TARGET_RATIO) as u32, 0)
    };
    let crop_width = even(crop_width);
    let crop_height = even(crop_height);

    let border_radius = (crop_width as f64 * (16.0 / 360.0)) as u32;
    let border_thickness = ((crop_width as f64 * (2.0 / 360.0)).round_ties_even() as u32).max(1);

    let mut canvas_height = quantize_height(crop_height as f64 * CANVAS_HEIGHT_FACTOR);
    let mut canvas_width = (canvas_height / 4) * 3;

    let content_width = crop_width + 2 * border_thickness;
    if canvas_width < content_width {
        canvas_width = content_width;
        canvas_height = quantize_height(canvas_width as f64 * 4.0 / 3.0);
    }
    let canvas_width = even(canvas_width);
    let canvas_height = even(canvas_height);

    GeometryPlan {
        crop_width,
        crop_height,
        crop_x,
        crop_y: 0,
        border_radius,
        border_thickness,
        canvas_width,
        canvas_height,
        paste_x: canvas_width.saturating_sub(content_width) / 2,
        paste_y: 0,
    }
}
