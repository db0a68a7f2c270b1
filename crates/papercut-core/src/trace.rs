use crate::model::DetectedHeader;
use crate::slice::SliceBounds;
use serde::{Deserialize, Serialize};

pub const TRACE_SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceSeverity {
    Critical,
    Important,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStepType {
    TextDetect,
    OcrDetect,
    OcrSkipped,
    Dedupe,
    Render,
    Slice,
    DegenerateSlice,
    PageError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStep {
    pub step_type: TraceStepType,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceTrace {
    pub question_number: u32,
    pub y_start: f32,
    pub y_end: f32,
    /// False when the slice was dropped as too short.
    pub kept: bool,
}

/// What happened on one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageTrace {
    pub page_number: usize,
    pub token_count: usize,
    pub text_headers: usize,
    pub ocr_attempted: bool,
    pub ocr_headers: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kept_headers: Vec<DetectedHeader>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slices: Vec<SliceTrace>,
    pub steps: Vec<TraceStep>,
}

impl PageTrace {
    pub fn new(page_number: usize) -> Self {
        PageTrace {
            page_number,
            token_count: 0,
            text_headers: 0,
            ocr_attempted: false,
            ocr_headers: 0,
            kept_headers: Vec::new(),
            slices: Vec::new(),
            steps: Vec::new(),
        }
    }

    pub fn step(&mut self, step_type: TraceStepType, message: impl Into<String>) {
        self.steps.push(TraceStep {
            step_type,
            message: message.into(),
        });
    }

    pub fn slice(&mut self, bounds: &SliceBounds, kept: bool) {
        self.slices.push(SliceTrace {
            question_number: bounds.question_number,
            y_start: bounds.y_start,
            y_end: bounds.y_end,
            kept,
        });
    }

    /// Number of slices that were dropped as degenerate.
    pub fn degenerate_count(&self) -> usize {
        self.slices.iter().filter(|s| !s.kept).count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceWarning {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<usize>,
    pub message: String,
    pub severity: TraceSeverity,
}

/// Diagnostics for a whole segmentation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentTrace {
    pub trace_schema_version: String,
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recognizer: Option<String>,
    pub page_count: usize,
    pub ocr_pages_used: usize,
    pub pages: Vec<PageTrace>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<TraceWarning>,
}

impl Default for SegmentTrace {
    fn default() -> Self {
        Self {
            trace_schema_version: TRACE_SCHEMA_VERSION.to_string(),
            backend: String::new(),
            recognizer: None,
            page_count: 0,
            ocr_pages_used: 0,
            pages: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl SegmentTrace {
    pub fn warn(&mut self, page_number: Option<usize>, message: impl Into<String>, severity: TraceSeverity) {
        self.warnings.push(TraceWarning {
            page_number,
            message: message.into(),
            severity,
        });
    }

    pub fn page(&self, page_number: usize) -> Option<&PageTrace> {
        self.pages.iter().find(|p| p.page_number == page_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_serializes_without_empty_fields() {
        let mut trace = SegmentTrace::default();
        let mut page = PageTrace::new(1);
        page.step(TraceStepType::TextDetect, "2 header(s) from 40 tokens");
        trace.pages.push(page);
        let json = serde_json::to_value(&trace).unwrap();
        assert_eq!(json["trace_schema_version"], "1.0");
        assert!(json.get("warnings").is_none());
        assert!(json["pages"][0].get("slices").is_none());
        assert_eq!(json["pages"][0]["steps"][0]["step_type"], "text_detect");
    }

    #[test]
    fn test_degenerate_count() {
        let mut page = PageTrace::new(3);
        let b = SliceBounds {
            question_number: 1,
            y_start: 0.0,
            y_end: 10.0,
        };
        page.slice(&b, false);
        page.slice(&b, true);
        assert_eq!(page.degenerate_count(), 1);
    }
}
