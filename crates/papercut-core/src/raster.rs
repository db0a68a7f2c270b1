use crate::error::PapercutError;
use crate::extraction::{check_page, DocumentSource};
use crate::model::Viewport;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Viewport of a page at `scale`.
pub fn viewport(doc: &dyn DocumentSource, page: usize, scale: f32) -> Result<Viewport, PapercutError> {
    check_page(doc, page)?;
    Ok(Viewport::new(doc.page_size(page)?, scale))
}

/// Height in pixels of a page rendered at `scale`.
pub fn page_height(doc: &dyn DocumentSource, page: usize, scale: f32) -> Result<f32, PapercutError> {
    Ok(viewport(doc, page, scale)?.height)
}

/// Render a page, rejecting out-of-range pages and empty bitmaps.
pub fn render_page(
    doc: &dyn DocumentSource,
    page: usize,
    scale: f32,
) -> Result<RgbaImage, PapercutError> {
    if page == 0 || page > doc.page_count() {
        return Err(PapercutError::Render {
            page,
            reason: format!("page out of range (document has {} pages)", doc.page_count()),
        });
    }
    let bitmap = doc.render(page, scale)?;
    if bitmap.width() == 0 || bitmap.height() == 0 {
        return Err(PapercutError::Render {
            page,
            reason: "renderer produced an empty bitmap".into(),
        });
    }
    Ok(bitmap)
}

/// Crop a rectangle out of a bitmap.
///
/// The origin is clamped into the image and the size to at least one pixel
/// and at most what remains to the right and below, so the result is never
/// empty for a non-empty source.
pub fn crop_rect(source: &RgbaImage, x: f32, y: f32, width: f32, height: f32) -> RgbaImage {
    let (src_w, src_h) = source.dimensions();
    let x = clamp_px(x, 0, src_w.saturating_sub(1));
    let y = clamp_px(y, 0, src_h.saturating_sub(1));
    let w = clamp_px(width, 1, src_w - x);
    let h = clamp_px(height, 1, src_h - y);
    image::imageops::crop_imm(source, x, y, w, h).to_image()
}

/// Crop a full-width horizontal band `[y_start, y_end)`.
pub fn crop_band(source: &RgbaImage, y_start: f32, y_end: f32) -> RgbaImage {
    crop_rect(source, 0.0, y_start, source.width() as f32, y_end - y_start)
}

fn clamp_px(v: f32, min: u32, max: u32) -> u32 {
    let v = if v.is_finite() { v.round() } else { 0.0 };
    (v.max(min as f32) as u32).min(max.max(min))
}

/// How bitmaps are encoded when they leave the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "format")]
pub enum ImageEncoding {
    #[default]
    Png,
    Jpeg { quality: u8 },
}

impl ImageEncoding {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageEncoding::Png => "png",
            ImageEncoding::Jpeg { .. } => "jpg",
        }
    }
}

/// Encode a bitmap into an image blob.
pub fn encode(bitmap: &RgbaImage, encoding: ImageEncoding) -> Result<Vec<u8>, PapercutError> {
    let mut buf = Vec::new();
    match encoding {
        ImageEncoding::Png => {
            bitmap.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        }
        ImageEncoding::Jpeg { quality } => {
            // JPEG has no alpha channel.
            let rgb = DynamicImage::ImageRgba8(bitmap.clone()).to_rgb8();
            JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(&rgb)?;
        }
    }
    Ok(buf)
}
