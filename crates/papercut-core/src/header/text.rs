use super::{match_header, HeaderKind};
use crate::config::SegmentConfig;
use crate::layout::PageLayout;
use crate::model::{DetectedHeader, HeaderSource, TextLine, Viewport};

/// Find header candidates among a page's text-layer lines.
///
/// `viewport` must be the one the layout was computed with, so that line
/// positions are already in reference-scale pixels.
pub fn detect_text_headers(
    layout: &PageLayout,
    viewport: &Viewport,
    config: &SegmentConfig,
) -> Vec<DetectedHeader> {
    layout
        .lines
        .iter()
        .filter(|line| !line.text.is_empty())
        .filter_map(|line| classify_line(line, layout.median_font_height, viewport, config))
        .collect()
}

/// Decide whether one line is a question header.
///
/// Keyword headers always qualify. Dotted sub-numbering must sit in the left
/// margin. Bare numbers like "3)" must also be set in a larger font and be
/// short, which keeps marks annotations and page numbers out.
pub fn classify_line(
    line: &TextLine,
    median_font_height: f32,
    viewport: &Viewport,
    config: &SegmentConfig,
) -> Option<DetectedHeader> {
    let m = match_header(&line.text)?;

    let left_aligned = line.left_x <= viewport.width * config.header_left_margin_ratio;
    let font_ratio = if median_font_height > 0.0 {
        line.max_font_height / median_font_height
    } else {
        0.0
    };

    let header_like = match m.kind {
        HeaderKind::Keyword => true,
        HeaderKind::Dotted => left_aligned,
        HeaderKind::Numeric => {
            left_aligned
                && font_ratio >= config.header_font_ratio
                && line.text.chars().count() <= config.header_max_chars
        }
    };
    if !header_like {
        log::debug!(
            "rejected {:?} at y={:.1}: not header-like (x={:.1}, font ratio {:.2})",
            line.text,
            line.top_y,
            line.left_x,
            font_ratio
        );
        return None;
    }

    let mut confidence: f32 = 0.5;
    if m.kind == HeaderKind::Keyword {
        confidence += 0.35;
    }
    if font_ratio >= config.confidence_font_ratio {
        confidence += 0.15;
    }
    if left_aligned {
        confidence += 0.10;
    }

    Some(DetectedHeader {
        question_number: m.number,
        y_position: line.top_y,
        x_position: line.left_x,
        confidence: confidence.clamp(0.0, 1.0),
        source: HeaderSource::Text,
    })
}
