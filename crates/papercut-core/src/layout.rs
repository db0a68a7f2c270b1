use crate::config::SegmentConfig;
use crate::model::{TextLine, TextToken, Viewport};

/// Lines of one page plus the statistics the header detector needs.
#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    /// Lines in reading order, top to bottom.
    pub lines: Vec<TextLine>,
    /// Median positive font height in PDF units.
    pub median_font_height: f32,
    pub token_count: usize,
}

/// Group a page's tokens into reading-order lines.
///
/// Tokens join the first line whose representative y lies within an
/// adaptive tolerance derived from the page's median font height.
pub fn analyze_page(tokens: &[TextToken], viewport: &Viewport, config: &SegmentConfig) -> PageLayout {
    let median = median_font_height(tokens, config.default_font_height);

    if tokens.is_empty() {
        return PageLayout {
            lines: Vec::new(),
            median_font_height: median,
            token_count: 0,
        };
    }

    let tolerance = line_tolerance(median, config);

    // (representative y, member tokens)
    let mut groups: Vec<(f32, Vec<&TextToken>)> = Vec::new();
    for token in tokens {
        match groups
            .iter_mut()
            .find(|(y, _)| (*y - token.y).abs() <= tolerance)
        {
            Some((_, members)) => members.push(token),
            None => groups.push((token.y, vec![token])),
        }
    }

    // Higher PDF y is closer to the top of the page.
    groups.sort_by(|a, b| b.0.total_cmp(&a.0));

    let lines = groups
        .into_iter()
        .map(|(pdf_y, mut members)| {
            members.sort_by(|a, b| a.x.total_cmp(&b.x));
            let joined = members
                .iter()
                .map(|t| t.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            let left_x = members.iter().map(|t| t.x).fold(f32::INFINITY, f32::min);
            let max_font_height = members.iter().map(|t| t.font_height).fold(0.0, f32::max);
            TextLine {
                text: normalize_ws(&joined),
                pdf_y,
                top_y: viewport.to_canvas_y(pdf_y),
                left_x: viewport.to_canvas_x(left_x),
                max_font_height,
            }
        })
        .collect();

    PageLayout {
        lines,
        median_font_height: median,
        token_count: tokens.len(),
    }
}

/// Median of all positive font heights, or `fallback` if there are none.
pub fn median_font_height(tokens: &[TextToken], fallback: f32) -> f32 {
    let mut heights: Vec<f32> = tokens
        .iter()
        .map(|t| t.font_height)
        .filter(|h| *h > 0.0)
        .collect();
    if heights.is_empty() {
        return fallback;
    }
    heights.sort_by(|a, b| a.total_cmp(b));
    heights[heights.len() / 2]
}

fn line_tolerance(median: f32, config: &SegmentConfig) -> f32 {
    (median * config.line_tolerance_factor)
        .max(config.line_tolerance_min)
        .min(config.line_tolerance_max)
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
