use image::RgbaImage;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A positioned text run from a page's text layer.
///
/// Coordinates are in PDF space: origin bottom-left, y grows upward, units
/// are points at scale 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextToken {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub font_height: f32,
}

impl TextToken {
    /// Build a token, replacing non-finite coordinates with 0 and taking the
    /// absolute font height (mirrored text matrices report negative heights).
    pub fn new(text: impl Into<String>, x: f32, y: f32, font_height: f32) -> Self {
        TextToken {
            text: text.into(),
            x: finite_or_zero(x),
            y: finite_or_zero(y),
            font_height: finite_or_zero(font_height).abs(),
        }
    }

    /// Build a token from a text matrix `[a, b, c, d, e, f]`: height is `d`,
    /// position is `(e, f)`. Missing entries default to 0.
    pub fn from_transform(text: impl Into<String>, transform: &[f32]) -> Self {
        let at = |i: usize| transform.get(i).copied().unwrap_or(0.0);
        TextToken::new(text, at(4), at(5), at(3))
    }
}

fn finite_or_zero(v: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Tokens sharing a baseline, joined left to right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    /// Joined, whitespace-normalized text.
    pub text: String,
    /// Representative y in PDF space.
    pub pdf_y: f32,
    /// Top-down y in canvas pixels at the layout viewport's scale.
    pub top_y: f32,
    /// Leftmost token x in canvas pixels.
    pub left_x: f32,
    /// Largest font height on the line, in PDF units.
    pub max_font_height: f32,
}

/// Page dimensions in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// A page rendered at a given scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(size: PageSize, scale: f32) -> Self {
        Viewport {
            scale,
            width: size.width * scale,
            height: size.height * scale,
        }
    }

    /// Convert a bottom-up PDF y into a top-down canvas y.
    pub fn to_canvas_y(&self, pdf_y: f32) -> f32 {
        self.height - pdf_y * self.scale
    }

    pub fn to_canvas_x(&self, pdf_x: f32) -> f32 {
        pdf_x * self.scale
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderSource {
    Text,
    Ocr,
}

impl fmt::Display for HeaderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderSource::Text => write!(f, "text"),
            HeaderSource::Ocr => write!(f, "OCR"),
        }
    }
}

/// A question header found on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedHeader {
    /// Main question number (sub-parts like "1.2" roll up into 1).
    pub question_number: u32,
    /// Top-down y in pixels at the reference scale.
    pub y_position: f32,
    /// Left x in pixels at the reference scale.
    pub x_position: f32,
    /// Score in [0, 1], used to pick between competing candidates.
    pub confidence: f32,
    pub source: HeaderSource,
}

/// Vertical extent of a question, normalized to scale 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub y_start: f32,
    pub y_end: f32,
}

/// One question (or memo answer) cut out of a document.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedQuestion {
    pub number: u32,
    pub text: String,
    pub marks: Decimal,
    /// All parts stitched top to bottom.
    #[serde(skip)]
    pub image: Option<RgbaImage>,
    /// Individual parts in page order.
    #[serde(skip)]
    pub source_images: Vec<RgbaImage>,
    /// First page (1-based) the question appears on.
    pub page: usize,
    pub coordinates: Coordinates,
}

impl ExtractedQuestion {
    pub fn part_count(&self) -> usize {
        self.source_images.len()
    }

    /// Pixel dimensions of the stitched image, if any.
    pub fn image_size(&self) -> Option<(u32, u32)> {
        self.image.as_ref().map(|img| img.dimensions())
    }
}
