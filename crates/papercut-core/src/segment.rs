//! Whole-document segmentation.
//!
//! Pages are processed one at a time: text-layer header detection, an
//! optional recognition fallback, one render at the reference scale and
//! slicing. Slices are merged per question number across the document.

use crate::config::SegmentConfig;
use crate::error::PapercutError;
use crate::extraction::DocumentSource;
use crate::header::dedupe_headers;
use crate::header::ocr::detect_ocr_headers;
use crate::header::text::detect_text_headers;
use crate::layout::analyze_page;
use crate::model::{Coordinates, DetectedHeader, ExtractedQuestion, Viewport};
use crate::ocr::TextRecognizer;
use crate::raster;
use crate::slice::{compute_slices, cut_slice, is_degenerate, stitch_vertical};
use crate::trace::{PageTrace, SegmentTrace, TraceSeverity, TraceStepType};
use image::RgbaImage;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One-way sink for human-readable status messages.
pub trait ProgressSink {
    fn report(&self, message: &str);
}

impl<F: Fn(&str)> ProgressSink for F {
    fn report(&self, message: &str) {
        self(message)
    }
}

/// Progress sink that drops every message.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _message: &str) {}
}

/// Shared flag for cooperative cancellation, checked before each page.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Questions found in a document plus the diagnostics of the run.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentationResult {
    /// One entry per question number, ascending.
    pub questions: Vec<ExtractedQuestion>,
    pub trace: SegmentTrace,
}

impl SegmentationResult {
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// No questions were detected anywhere. Not an error: the caller should
    /// offer manual entry instead.
    pub fn nothing_found(&self) -> bool {
        self.is_empty()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }
}

/// In-progress slices of one question number.
struct QuestionAccumulator {
    number: u32,
    parts: Vec<RgbaImage>,
    first_page: usize,
    coordinates: Coordinates,
}

/// Accumulators keyed by question number, shared by all pages of one run.
#[derive(Default)]
struct AccumulatorMap {
    by_number: BTreeMap<u32, QuestionAccumulator>,
}

impl AccumulatorMap {
    /// Add a slice. Coordinates are in pixels at `scale` and are stored
    /// divided by it.
    fn upsert(&mut self, number: u32, page: usize, part: RgbaImage, y_start: f32, y_end: f32, scale: f32) {
        let y_start = y_start / scale;
        let y_end = y_end / scale;
        match self.by_number.entry(number) {
            Entry::Occupied(mut e) => {
                let acc = e.get_mut();
                acc.parts.push(part);
                acc.coordinates.y_end = acc.coordinates.y_end.max(y_end);
            }
            Entry::Vacant(e) => {
                e.insert(QuestionAccumulator {
                    number,
                    parts: vec![part],
                    first_page: page,
                    coordinates: Coordinates { y_start, y_end },
                });
            }
        }
    }

    fn finish(self) -> Vec<ExtractedQuestion> {
        self.by_number
            .into_values()
            .map(|acc| ExtractedQuestion {
                number: acc.number,
                text: format!("(Merged question {})", acc.number),
                marks: Decimal::ZERO,
                image: stitch_vertical(&acc.parts),
                source_images: acc.parts,
                page: acc.first_page,
                coordinates: acc.coordinates,
            })
            .collect()
    }
}

/// Drives header detection, rendering and slicing over a whole document.
pub struct Segmenter<'a> {
    config: &'a SegmentConfig,
    recognizer: Option<&'a dyn TextRecognizer>,
    progress: &'a dyn ProgressSink,
    cancel: Option<&'a CancelFlag>,
}

impl<'a> Segmenter<'a> {
    pub fn new(config: &'a SegmentConfig) -> Self {
        Segmenter {
            config,
            recognizer: None,
            progress: &NoProgress,
            cancel: None,
        }
    }

    /// Enable the recognition fallback.
    pub fn with_recognizer(mut self, recognizer: &'a dyn TextRecognizer) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel(mut self, cancel: &'a CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Segment every page of `doc`.
    ///
    /// Per-page extraction, recognition and render failures are logged and
    /// recorded in the trace; only cancellation aborts the run.
    pub fn run(&self, doc: &dyn DocumentSource) -> Result<SegmentationResult, PapercutError> {
        let total = doc.page_count();
        let mut trace = SegmentTrace {
            page_count: total,
            recognizer: self.recognizer.map(|r| r.backend_name().to_string()),
            ..SegmentTrace::default()
        };
        let mut accumulators = AccumulatorMap::default();

        for page in 1..=total {
            if self.cancel.is_some_and(|c| c.is_cancelled()) {
                log::info!("segmentation cancelled before page {page}");
                return Err(PapercutError::Cancelled);
            }
            self.progress.report(&format!("Processing page {page} of {total}"));

            let mut page_trace = PageTrace::new(page);
            self.process_page(doc, page, &mut trace, &mut page_trace, &mut accumulators);
            trace.pages.push(page_trace);
        }

        let questions = accumulators.finish();
        log::info!(
            "segmented {} page(s) into {} question(s), OCR used on {} page(s)",
            total,
            questions.len(),
            trace.ocr_pages_used
        );
        Ok(SegmentationResult { questions, trace })
    }

    fn process_page(
        &self,
        doc: &dyn DocumentSource,
        page: usize,
        trace: &mut SegmentTrace,
        page_trace: &mut PageTrace,
        accumulators: &mut AccumulatorMap,
    ) {
        let config = self.config;
        let viewport = match raster::viewport(doc, page, config.reference_scale) {
            Ok(v) => v,
            Err(e) => {
                self.recover(trace, page_trace, page, &e);
                return;
            }
        };

        let mut candidates = self.detect_text(doc, page, &viewport, trace, page_trace);

        let ocr_wanted = self.recognizer.is_some()
            && (candidates.is_empty() || page_trace.token_count < config.sparse_token_threshold);
        if ocr_wanted {
            if trace.ocr_pages_used < config.max_ocr_pages {
                trace.ocr_pages_used += 1;
                page_trace.ocr_attempted = true;
                self.progress.report(&format!(
                    "OCR page {page} ({}/{})",
                    trace.ocr_pages_used, config.max_ocr_pages
                ));
                match self.detect_ocr(doc, page) {
                    Ok(found) => {
                        page_trace.ocr_headers = found.len();
                        page_trace.step(
                            TraceStepType::OcrDetect,
                            format!("{} header candidate(s) from recognition", found.len()),
                        );
                        candidates.extend(found);
                    }
                    Err(e) => self.recover(trace, page_trace, page, &e),
                }
            } else {
                log::debug!("page {page}: OCR cap of {} reached", config.max_ocr_pages);
                page_trace.step(
                    TraceStepType::OcrSkipped,
                    format!("recognition cap of {} page(s) reached", config.max_ocr_pages),
                );
            }
        }

        let headers = dedupe_headers(candidates, config);
        page_trace.step(
            TraceStepType::Dedupe,
            format!("{} header(s) kept", headers.len()),
        );
        if headers.is_empty() {
            log::debug!("page {page}: no headers, skipping");
            return;
        }
        page_trace.kept_headers = headers.clone();

        let bitmap = match raster::render_page(doc, page, config.reference_scale) {
            Ok(b) => b,
            Err(e) => {
                self.recover(trace, page_trace, page, &e);
                return;
            }
        };
        page_trace.step(
            TraceStepType::Render,
            format!("{}x{} at scale {}", bitmap.width(), bitmap.height(), config.reference_scale),
        );

        for bounds in compute_slices(&headers, bitmap.height() as f32, config) {
            if is_degenerate(&bounds, config) {
                log::debug!(
                    "page {page}: dropping {:.0}px slice for question {}",
                    bounds.height(),
                    bounds.question_number
                );
                page_trace.step(
                    TraceStepType::DegenerateSlice,
                    format!(
                        "question {} slice {:.1}..{:.1} too short",
                        bounds.question_number, bounds.y_start, bounds.y_end
                    ),
                );
                page_trace.slice(&bounds, false);
                continue;
            }
            page_trace.slice(&bounds, true);
            accumulators.upsert(
                bounds.question_number,
                page,
                cut_slice(&bitmap, &bounds),
                bounds.y_start,
                bounds.y_end,
                config.reference_scale,
            );
        }
        page_trace.step(
            TraceStepType::Slice,
            format!("{} slice(s) kept", page_trace.slices.len() - page_trace.degenerate_count()),
        );
    }

    fn detect_text(
        &self,
        doc: &dyn DocumentSource,
        page: usize,
        viewport: &Viewport,
        trace: &mut SegmentTrace,
        page_trace: &mut PageTrace,
    ) -> Vec<DetectedHeader> {
        match doc.text_tokens(page) {
            Ok(tokens) => {
                let layout = analyze_page(&tokens, viewport, self.config);
                let headers = detect_text_headers(&layout, viewport, self.config);
                page_trace.token_count = layout.token_count;
                page_trace.text_headers = headers.len();
                page_trace.step(
                    TraceStepType::TextDetect,
                    format!(
                        "{} header(s) from {} line(s), {} token(s)",
                        headers.len(),
                        layout.lines.len(),
                        layout.token_count
                    ),
                );
                headers
            }
            Err(e) => {
                self.recover(trace, page_trace, page, &e);
                Vec::new()
            }
        }
    }

    fn detect_ocr(&self, doc: &dyn DocumentSource, page: usize) -> Result<Vec<DetectedHeader>, PapercutError> {
        let Some(recognizer) = self.recognizer else {
            return Ok(Vec::new());
        };
        let bitmap = raster::render_page(doc, page, self.config.recognition_scale)?;
        let lines = recognizer
            .recognize(&bitmap)
            .map_err(|e| match e {
                PapercutError::PageRecognition { .. } => e,
                other => PapercutError::PageRecognition {
                    page,
                    reason: other.to_string(),
                },
            })?;
        Ok(detect_ocr_headers(&lines, bitmap.width() as f32, self.config))
    }

    /// Log a page-level failure and record it; the page keeps whatever
    /// candidates it already has.
    fn recover(&self, trace: &mut SegmentTrace, page_trace: &mut PageTrace, page: usize, err: &PapercutError) {
        log::warn!("page {page}: {err}");
        page_trace.step(TraceStepType::PageError, err.to_string());
        let severity = if err.is_page_local() {
            TraceSeverity::Important
        } else {
            TraceSeverity::Critical
        };
        trace.warn(Some(page), err.to_string(), severity);
    }
}

/// Segment an opened document. Convenience wrapper around [`Segmenter`].
pub fn segment_document(
    doc: &dyn DocumentSource,
    recognizer: Option<&dyn TextRecognizer>,
    config: &SegmentConfig,
    progress: &dyn ProgressSink,
    cancel: Option<&CancelFlag>,
) -> Result<SegmentationResult, PapercutError> {
    let mut segmenter = Segmenter::new(config).with_progress(progress);
    if let Some(r) = recognizer {
        segmenter = segmenter.with_recognizer(r);
    }
    if let Some(c) = cancel {
        segmenter = segmenter.with_cancel(c);
    }
    segmenter.run(doc)
}
