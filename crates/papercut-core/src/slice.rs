use crate::config::SegmentConfig;
use crate::model::DetectedHeader;
use crate::raster::crop_band;
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Vertical extent computed for one header, in reference-scale pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliceBounds {
    pub question_number: u32,
    pub y_start: f32,
    pub y_end: f32,
}

impl SliceBounds {
    pub fn height(&self) -> f32 {
        self.y_end - self.y_start
    }
}

/// Compute crop bounds for each header on a page.
///
/// `headers` must be deduplicated and sorted top to bottom. Each slice
/// starts `slice_top_padding` above its header and ends `slice_bottom_gap`
/// above the next header, or at the page bottom. Returns every computed
/// bound; use [`is_degenerate`] to tell which ones to drop.
pub fn compute_slices(
    headers: &[DetectedHeader],
    page_height: f32,
    config: &SegmentConfig,
) -> Vec<SliceBounds> {
    headers
        .iter()
        .enumerate()
        .map(|(j, h)| {
            let y_start = (h.y_position - config.slice_top_padding).clamp(0.0, page_height);
            let y_end = match headers.get(j + 1) {
                Some(next) => (next.y_position - config.slice_bottom_gap).clamp(0.0, page_height),
                None => page_height,
            };
            SliceBounds {
                question_number: h.question_number,
                y_start,
                y_end,
            }
        })
        .collect()
}

/// Whether a slice is too short to hold a question.
pub fn is_degenerate(bounds: &SliceBounds, config: &SegmentConfig) -> bool {
    bounds.height() < config.min_slice_height
}

/// Cut one slice out of a full-page bitmap.
pub fn cut_slice(page: &RgbaImage, bounds: &SliceBounds) -> RgbaImage {
    crop_band(page, bounds.y_start, bounds.y_end)
}

/// Stack parts top to bottom into one image.
///
/// The canvas is as wide as the widest part; narrower parts are left-aligned
/// on white. A single part is returned as an unchanged copy.
pub fn stitch_vertical(parts: &[RgbaImage]) -> Option<RgbaImage> {
    match parts {
        [] => None,
        [only] => Some(only.clone()),
        _ => {
            let width = parts.iter().map(|p| p.width()).max().unwrap_or(0);
            let height: u32 = parts.iter().map(|p| p.height()).sum();
            let mut canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
            let mut y: i64 = 0;
            for part in parts {
                image::imageops::overlay(&mut canvas, part, 0, y);
                y += i64::from(part.height());
            }
            Some(canvas)
        }
    }
}
