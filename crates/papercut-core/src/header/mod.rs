//! Question header detection.
//!
//! Two detectors share one matching policy and one output type:
//! [`text`] works on the page's text layer, [`ocr`] on recognized lines from
//! a rendered bitmap. Candidates from both are merged by [`dedupe_headers`].

pub mod ocr;
pub mod text;

use crate::config::SegmentConfig;
use crate::layout::normalize_ws;
use crate::model::DetectedHeader;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

lazy_static! {
    /// "Question 1", "Q.1", "Q U E S T I O N 1", "Answer: 3", "Solution-2".
    static ref KEYWORD_HEADER: Regex = Regex::new(
        r"(?i)^(?:q(?: ?u ?e ?s ?t ?i ?o ?n)?|a ?n ?s ?w ?e ?r|s ?o ?l ?u ?t ?i ?o ?n)\s*[.:)\-]*\s*(\d+)"
    )
    .expect("keyword header pattern");

    /// "1.2", "3.1.4": only the main number is kept.
    static ref DOTTED_HEADER: Regex =
        Regex::new(r"^(\d{1,3})\.\d{1,3}(?:\.\d{1,3})?\b").expect("dotted header pattern");

    /// "(4) ", "4. ", "4) ", "4: ".
    static ref NUMERIC_HEADER: Regex =
        Regex::new(r"^(?:\((\d{1,3})\)|(\d{1,3})[.):])\s").expect("numeric header pattern");
}

/// Which rule matched a header line, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    Keyword,
    Dotted,
    Numeric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderMatch {
    pub number: u32,
    pub kind: HeaderKind,
}

/// Match a line of text against the header rules.
///
/// Returns the main question number; zero is never a valid number.
pub fn match_header(line: &str) -> Option<HeaderMatch> {
    let t = normalize_ws(line);

    if let Some(number) = KEYWORD_HEADER.captures(&t).and_then(main_number) {
        return Some(HeaderMatch {
            number,
            kind: HeaderKind::Keyword,
        });
    }
    if let Some(number) = DOTTED_HEADER.captures(&t).and_then(main_number) {
        return Some(HeaderMatch {
            number,
            kind: HeaderKind::Dotted,
        });
    }
    // The trailing space is part of the pattern, so a bare "4." at the end
    // of a line needs one appended.
    let padded = format!("{t} ");
    if let Some(number) = NUMERIC_HEADER.captures(&padded).and_then(main_number) {
        return Some(HeaderMatch {
            number,
            kind: HeaderKind::Numeric,
        });
    }
    None
}

fn main_number(caps: Captures<'_>) -> Option<u32> {
    caps.iter()
        .skip(1)
        .flatten()
        .find_map(|m| m.as_str().parse::<u32>().ok())
        .filter(|n| *n > 0)
}

/// Collapse competing candidates for one page.
///
/// First keeps the most confident candidate per question number, then sorts
/// top to bottom and merges candidates closer than `dedup_window`, again
/// keeping the most confident one. Ties keep the earlier candidate.
pub fn dedupe_headers(candidates: Vec<DetectedHeader>, config: &SegmentConfig) -> Vec<DetectedHeader> {
    let mut by_number: BTreeMap<u32, DetectedHeader> = BTreeMap::new();
    for h in candidates {
        match by_number.get(&h.question_number) {
            Some(existing) if existing.confidence >= h.confidence => {}
            _ => {
                by_number.insert(h.question_number, h);
            }
        }
    }

    let mut sorted: Vec<DetectedHeader> = by_number.into_values().collect();
    sorted.sort_by(|a, b| a.y_position.total_cmp(&b.y_position));

    let mut kept: Vec<DetectedHeader> = Vec::with_capacity(sorted.len());
    for h in sorted {
        match kept.last_mut() {
            Some(prev) if (h.y_position - prev.y_position).abs() <= config.dedup_window => {
                if h.confidence > prev.confidence {
                    *prev = h;
                }
            }
            _ => kept.push(h),
        }
    }
    kept
}
