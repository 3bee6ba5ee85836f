//! Rounded-corner mask and border rasters used as filter inputs.

use image::{GrayImage, Luma, Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use tracing::debug;

use crate::geometry::GeometryPlan;

/// Default border colour: white at roughly 15% opacity.
pub const DEFAULT_BORDER_RGBA: [u8; 4] = [255, 255, 255, 38];

/// Errors from rendering the overlay assets.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// Scoped directory could not be created.
    #[error("Failed to create overlay directory under {path}: {source}")]
    TempDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The plan has a zero-sized crop.
    #[error("Cannot render overlay for empty crop {width}x{height}")]
    EmptyCrop { width: u32, height: u32 },

    /// The blocking render task did not complete.
    #[error("Overlay rendering task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Encoding or writing a PNG failed.
    #[error("Failed to write overlay {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Mask and border PNGs for one source file.
///
/// The files live in a private temporary directory that is removed when this
/// value is dropped.
#[derive(Debug)]
pub struct OverlayAssets {
    dir: TempDir,
    mask_path: PathBuf,
    border_path: PathBuf,
}

impl OverlayAssets {
    /// Renders both rasters for `plan` into a fresh directory under `temp_root`.
    pub fn render(
        plan: &GeometryPlan,
        temp_root: &Path,
        stem: &str,
        border_rgba: [u8; 4],
    ) -> Result<Self, OverlayError> {
        if plan.crop_width == 0 || plan.crop_height == 0 {
            return Err(OverlayError::EmptyCrop {
                width: plan.crop_width,
                height: plan.crop_height,
            });
        }

        let dir = scoped_dir(temp_root, "overlay-")?;
        let mask_path = dir.path().join(format!("{}_mask.png", stem));
        let border_path = dir.path().join(format!("{}_border.png", stem));

        render_mask(plan.crop_width, plan.crop_height, plan.border_radius)
            .save(&mask_path)
            .map_err(|source| OverlayError::Write {
                path: mask_path.clone(),
                source,
            })?;

        render_border(
            plan.bordered_width(),
            plan.bordered_height(),
            plan.border_radius + plan.border_thickness,
            border_rgba,
        )
        .save(&border_path)
        .map_err(|source| OverlayError::Write {
            path: border_path.clone(),
            source,
        })?;

        debug!(
            dir = %dir.path().display(),
            radius = plan.border_radius,
            border = plan.border_thickness,
            "Rendered overlay assets"
        );

        Ok(Self {
            dir,
            mask_path,
            border_path,
        })
    }

    /// Runs [`OverlayAssets::render`] on the blocking pool.
    ///
    /// Rasterizing and encoding a large crop takes long enough to stall the
    /// runtime threads that read other jobs' transcoder output.
    pub async fn spawn_render(
        plan: GeometryPlan,
        temp_root: PathBuf,
        stem: String,
        border_rgba: [u8; 4],
    ) -> Result<Self, OverlayError> {
        tokio::fs::create_dir_all(&temp_root)
            .await
            .map_err(|source| OverlayError::TempDir {
                path: temp_root.clone(),
                source,
            })?;
        tokio::task::spawn_blocking(move || Self::render(&plan, &temp_root, &stem, border_rgba))
            .await?
    }

    pub fn mask_path(&self) -> &Path {
        &self.mask_path
    }

    pub fn border_path(&self) -> &Path {
        &self.border_path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

/// Creates a uniquely named directory under `root`, creating `root` if needed.
pub(crate) fn scoped_dir(root: &Path, prefix: &str) -> Result<TempDir, OverlayError> {
    std::fs::create_dir_all(root)
        .and_then(|_| tempfile::Builder::new().prefix(prefix).tempdir_in(root))
        .map_err(|source| OverlayError::TempDir {
            path: root.to_path_buf(),
            source,
        })
}

/// Whether pixel `(x, y)` lies inside a `width`×`height` rectangle whose
/// corners are rounded with `radius`.
fn inside_rounded_rect(x: u32, y: u32, width: u32, height: u32, radius: u32) -> bool {
    let radius = radius.min(width / 2).min(height / 2);
    if radius == 0 {
        return true;
    }

    // Pixel centers, measured against the corner circle centers.
    let px = x as f64 + 0.5;
    let py = y as f64 + 0.5;
    let r = radius as f64;
    let cx = if px < r {
        r
    } else if px > width as f64 - r {
        width as f64 - r
    } else {
        return true;
    };
    let cy = if py < r {
        r
    } else if py > height as f64 - r {
        height as f64 - r
    } else {
        return true;
    };

    (px - cx).powi(2) + (py - cy).powi(2) <= r * r
}

/// Opaque stencil: 255 inside the rounded rectangle, 0 in the cut corners.
pub fn render_mask(width: u32, height: u32, radius: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        if inside_rounded_rect(x, y, width, height, radius) {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Translucent border plate: `rgba` inside the rounded rectangle, fully
/// transparent in the corners.
pub fn render_border(width: u32, height: u32, radius: u32, rgba: [u8; 4]) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        if inside_rounded_rect(x, y, width, height, radius) {
            Rgba(rgba)
        } else {
            Rgba([rgba[0], rgba[1], rgba[2], 0])
        }
    })
}
