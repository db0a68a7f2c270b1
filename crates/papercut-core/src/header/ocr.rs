use super::{match_header, HeaderKind};
use crate::config::SegmentConfig;
use crate::layout::normalize_ws;
use crate::model::{DetectedHeader, HeaderSource};
use crate::ocr::RecognizedLine;

/// Find header candidates among recognized lines.
///
/// `bitmap_width` is the width of the recognized bitmap in pixels at
/// `config.recognition_scale`. Returned positions are converted to the
/// reference scale so they can be merged with text-layer candidates.
pub fn detect_ocr_headers(
    lines: &[RecognizedLine],
    bitmap_width: f32,
    config: &SegmentConfig,
) -> Vec<DetectedHeader> {
    let to_reference = config.recognition_to_reference();
    let mut headers: Vec<DetectedHeader> = lines
        .iter()
        .filter_map(|line| {
            let text = normalize_ws(&line.text);
            if text.is_empty() {
                return None;
            }
            let m = match_header(&text)?;

            let x0 = line.bbox.x0;
            let height = line.bbox.height();
            if x0 > bitmap_width * config.ocr_left_margin_ratio {
                log::debug!("OCR line {:?} rejected: x0={:.1} outside margin", text, x0);
                return None;
            }
            if height < config.ocr_min_line_height {
                log::debug!("OCR line {:?} rejected: height {:.1} too small", text, height);
                return None;
            }

            let mut confidence: f32 = 0.45;
            if m.kind == HeaderKind::Keyword {
                confidence += 0.35;
            }
            if x0 <= bitmap_width * config.ocr_left_bonus_ratio {
                confidence += 0.10;
            }
            if height >= config.ocr_tall_line_height {
                confidence += 0.10;
            }

            Some(DetectedHeader {
                question_number: m.number,
                y_position: line.bbox.y0 * to_reference,
                x_position: x0 * to_reference,
                confidence: confidence.clamp(0.0, 1.0),
                source: HeaderSource::Ocr,
            })
        })
        .collect();

    headers.sort_by(|a, b| a.y_position.total_cmp(&b.y_position));
    headers
}
