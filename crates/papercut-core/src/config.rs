use crate::error::PapercutError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Heuristic constants used by the segmentation pipeline.
///
/// The defaults were tuned by hand on a small set of exam papers; any field
/// can be overridden from a JSON file, missing fields keep their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Render scale used for slicing. Stored coordinates are divided by it.
    pub reference_scale: f32,
    /// Cheaper render scale used for text recognition.
    pub recognition_scale: f32,

    /// Line clustering tolerance = clamp(factor * median font height, min, max).
    pub line_tolerance_factor: f32,
    pub line_tolerance_min: f32,
    pub line_tolerance_max: f32,
    /// Median font height assumed when a page has no usable heights.
    pub default_font_height: f32,

    /// Left margin, as a fraction of page width, for header-like lines.
    pub header_left_margin_ratio: f32,
    /// Bare numeric headers need a font at least this much larger than the median.
    pub header_font_ratio: f32,
    /// Bare numeric headers longer than this are treated as body text.
    pub header_max_chars: usize,
    /// Font ratio that earns the large-font confidence bonus.
    pub confidence_font_ratio: f32,

    /// Pixels kept above a header line.
    pub slice_top_padding: f32,
    /// Pixels left between a slice and the next header.
    pub slice_bottom_gap: f32,
    /// Slices shorter than this are dropped.
    pub min_slice_height: f32,
    /// Headers closer than this collapse into one.
    pub dedup_window: f32,

    /// Maximum pages per document sent to text recognition.
    pub max_ocr_pages: usize,
    /// Pages with fewer tokens than this are treated as scanned.
    pub sparse_token_threshold: usize,
    /// Recognized lines must start within this fraction of the page width.
    pub ocr_left_margin_ratio: f32,
    /// Recognized lines starting within this fraction earn a bonus.
    pub ocr_left_bonus_ratio: f32,
    /// Minimum recognized line height in pixels at recognition scale.
    pub ocr_min_line_height: f32,
    /// Recognized line height that earns the tall-line bonus.
    pub ocr_tall_line_height: f32,

    /// Smallest width or height a crop rectangle can be dragged to.
    pub crop_min_size: f32,
    /// Rectangle height after switching pages in the crop editor.
    pub crop_default_height: f32,
    /// Minimum rectangle height when a crop session opens.
    pub crop_min_initial_height: f32,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        SegmentConfig {
            reference_scale: 1.6,
            recognition_scale: 1.2,
            line_tolerance_factor: 0.6,
            line_tolerance_min: 3.0,
            line_tolerance_max: 10.0,
            default_font_height: 10.0,
            header_left_margin_ratio: 0.2,
            header_font_ratio: 1.15,
            header_max_chars: 50,
            confidence_font_ratio: 1.2,
            slice_top_padding: 40.0,
            slice_bottom_gap: 16.0,
            min_slice_height: 40.0,
            dedup_window: 18.0,
            max_ocr_pages: 6,
            sparse_token_threshold: 30,
            ocr_left_margin_ratio: 0.25,
            ocr_left_bonus_ratio: 0.2,
            ocr_min_line_height: 14.0,
            ocr_tall_line_height: 20.0,
            crop_min_size: 10.0,
            crop_default_height: 200.0,
            crop_min_initial_height: 50.0,
        }
    }
}

impl SegmentConfig {
    /// Factor converting recognition-scale pixels into reference-scale pixels.
    pub fn recognition_to_reference(&self) -> f32 {
        self.reference_scale / self.recognition_scale
    }
}

/// Load a config from a JSON file.
pub fn load_config(path: &Path) -> Result<SegmentConfig, PapercutError> {
    let content = std::fs::read_to_string(path).map_err(|e| PapercutError::ConfigLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let config: SegmentConfig =
        serde_json::from_str(&content).map_err(|e| PapercutError::ConfigLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    validate_config(&config)?;
    Ok(config)
}

/// Parse a config from a JSON string (no file path context).
pub fn parse_config_str(json: &str) -> Result<SegmentConfig, PapercutError> {
    let config: SegmentConfig = serde_json::from_str(json)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate that a config is usable.
pub fn validate_config(config: &SegmentConfig) -> Result<(), PapercutError> {
    for (name, value) in [
        ("reference_scale", config.reference_scale),
        ("recognition_scale", config.recognition_scale),
        ("default_font_height", config.default_font_height),
        ("crop_min_size", config.crop_min_size),
    ] {
        if !(value.is_finite() && value > 0.0) {
            return Err(PapercutError::InvalidConfig(format!(
                "{} must be positive, got {}",
                name, value
            )));
        }
    }

    if config.line_tolerance_min > config.line_tolerance_max {
        return Err(PapercutError::InvalidConfig(format!(
            "line_tolerance_min ({}) exceeds line_tolerance_max ({})",
            config.line_tolerance_min, config.line_tolerance_max
        )));
    }

    for (name, value) in [
        ("header_left_margin_ratio", config.header_left_margin_ratio),
        ("ocr_left_margin_ratio", config.ocr_left_margin_ratio),
        ("ocr_left_bonus_ratio", config.ocr_left_bonus_ratio),
    ] {
        if !(value > 0.0 && value <= 1.0) {
            return Err(PapercutError::InvalidConfig(format!(
                "{} must be in (0, 1], got {}",
                name, value
            )));
        }
    }

    if config.min_slice_height < 1.0 {
        return Err(PapercutError::InvalidConfig(
            "min_slice_height must be at least 1 pixel".into(),
        ));
    }

    Ok(())
}
