pub mod tesseract;

use crate::error::PapercutError;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Axis-aligned box in the recognized bitmap's pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).max(0.0)
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// One line of recognized text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedLine {
    pub text: String,
    pub bbox: BBox,
}

/// Trait for text recognition backends.
///
/// Lines come back in approximate reading order; callers must not rely on
/// the order and should sort by `bbox.y0` when it matters.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, bitmap: &RgbaImage) -> Result<Vec<RecognizedLine>, PapercutError>;

    /// Name of this recognition backend (for diagnostics).
    fn backend_name(&self) -> &str;
}
