//! Integration tests for the segment_pdf() pipeline.
//!
//! Uses a MockDocument with synthetic text tokens and renders, and a
//! MockRecognizer that counts invocations, so these tests run without
//! poppler-utils or tesseract.

use image::{Rgba, RgbaImage};
use papercut_core::config::SegmentConfig;
use papercut_core::crop::{apply_crop, CropSession, CropTarget, CropTargetKind, Handle};
use papercut_core::error::PapercutError;
use papercut_core::extraction::{DocumentOpener, DocumentSource};
use papercut_core::model::{HeaderSource, PageSize, TextToken};
use papercut_core::ocr::{BBox, RecognizedLine, TextRecognizer};
use papercut_core::segment::{segment_document, CancelFlag, NoProgress, SegmentationResult};
use papercut_core::segment_pdf;
use papercut_core::trace::TraceStepType;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

const PAGE_W: f32 = 600.0;
const PAGE_H: f32 = 800.0;

#[derive(Clone)]
struct MockPage {
    /// `None` makes text extraction fail.
    tokens: Option<Vec<TextToken>>,
    render_fails: bool,
}

#[derive(Clone)]
struct MockDocument {
    pages: Vec<MockPage>,
}

impl DocumentSource for MockDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, _page: usize) -> Result<PageSize, PapercutError> {
        Ok(PageSize {
            width: PAGE_W,
            height: PAGE_H,
        })
    }

    fn text_tokens(&self, page: usize) -> Result<Vec<TextToken>, PapercutError> {
        self.pages[page - 1]
            .tokens
            .clone()
            .ok_or_else(|| PapercutError::PageExtraction {
                page,
                reason: "broken content stream".into(),
            })
    }

    /// Red channel is the page number, green is the row modulo 256.
    fn render(&self, page: usize, scale: f32) -> Result<RgbaImage, PapercutError> {
        if self.pages[page - 1].render_fails {
            return Err(PapercutError::Render {
                page,
                reason: "out of memory".into(),
            });
        }
        let w = (PAGE_W * scale) as u32;
        let h = (PAGE_H * scale) as u32;
        Ok(RgbaImage::from_fn(w, h, |_, y| {
            Rgba([page as u8, (y % 256) as u8, 0, 255])
        }))
    }
}

struct MockOpener {
    doc: MockDocument,
}

impl DocumentOpener for MockOpener {
    fn open(&self, pdf_bytes: &[u8]) -> Result<Box<dyn DocumentSource>, PapercutError> {
        if !pdf_bytes.starts_with(b"%PDF") {
            return Err(PapercutError::ToolFailed {
                tool: "pdfinfo".into(),
                code: 1,
                stderr: "May not be a PDF file".into(),
            });
        }
        Ok(Box::new(self.doc.clone()))
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}

/// Returns canned lines per page, identified by the render's red channel.
#[derive(Default)]
struct MockRecognizer {
    lines: HashMap<usize, Vec<RecognizedLine>>,
    failing_pages: Vec<usize>,
    calls: AtomicUsize,
}

impl MockRecognizer {
    fn with_header(mut self, page: usize, text: &str, y0: f32) -> Self {
        self.lines.entry(page).or_default().push(RecognizedLine {
            text: text.to_string(),
            bbox: BBox {
                x0: 40.0,
                y0,
                x1: 200.0,
                y1: y0 + 22.0,
            },
        });
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextRecognizer for MockRecognizer {
    fn recognize(&self, bitmap: &RgbaImage) -> Result<Vec<RecognizedLine>, PapercutError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let page = bitmap.get_pixel(0, 0).0[0] as usize;
        if self.failing_pages.contains(&page) {
            return Err(PapercutError::PageRecognition {
                page,
                reason: "engine timed out".into(),
            });
        }
        Ok(self.lines.get(&page).cloned().unwrap_or_default())
    }

    fn backend_name(&self) -> &str {
        "mock-ocr"
    }
}

/// Tokens of one line at a top-down canvas y (scale 1.0).
fn line(text: &str, x: f32, canvas_y: f32, font_height: f32) -> Vec<TextToken> {
    let mut x = x;
    text.split_whitespace()
        .map(|word| {
            let t = TextToken::new(word, x, PAGE_H - canvas_y, font_height);
            x += word.len() as f32 * font_height * 0.6 + 4.0;
            t
        })
        .collect()
}

fn text_page(lines: &[(&str, f32)]) -> MockPage {
    MockPage {
        tokens: Some(
            lines
                .iter()
                .flat_map(|(text, y)| line(text, 40.0, *y, 14.0))
                .collect(),
        ),
        render_fails: false,
    }
}

fn empty_page() -> MockPage {
    MockPage {
        tokens: Some(Vec::new()),
        render_fails: false,
    }
}

fn config() -> SegmentConfig {
    SegmentConfig {
        reference_scale: 1.0,
        recognition_scale: 1.0,
        ..SegmentConfig::default()
    }
}

fn run(pages: Vec<MockPage>, recognizer: Option<&dyn TextRecognizer>) -> SegmentationResult {
    let opener = MockOpener {
        doc: MockDocument { pages },
    };
    segment_pdf(b"%PDF-1.7", &opener, recognizer, &config(), &NoProgress).unwrap()
}

fn numbers(result: &SegmentationResult) -> Vec<u32> {
    result.questions.iter().map(|q| q.number).collect()
}

// ---------------------------------------------------------------------------
// End-to-end: two pages, three questions
// ---------------------------------------------------------------------------
#[test]
fn two_page_document_yields_three_questions() {
    let result = run(
        vec![
            text_page(&[("Question 1", 100.0), ("Question 2", 500.0)]),
            text_page(&[("Question 3", 100.0)]),
        ],
        None,
    );

    assert_eq!(numbers(&result), vec![1, 2, 3]);
    let coords: Vec<(f32, f32, usize)> = result
        .questions
        .iter()
        .map(|q| (q.coordinates.y_start, q.coordinates.y_end, q.page))
        .collect();
    assert_eq!(
        coords,
        vec![(60.0, 484.0, 1), (460.0, 800.0, 1), (60.0, 800.0, 2)]
    );
    assert_eq!(result.questions[0].image_size(), Some((600, 424)));
    assert_eq!(result.questions[2].text, "(Merged question 3)");
    assert_eq!(result.trace.backend, "mock");
    assert!(!result.nothing_found());
}

#[test]
fn single_part_stitch_is_identity() {
    let result = run(vec![text_page(&[("Question 1", 100.0)])], None);
    let q = &result.questions[0];
    assert_eq!(q.part_count(), 1);
    assert_eq!(q.image.as_ref(), Some(&q.source_images[0]));
    // first row of the slice is page row 60
    assert_eq!(q.source_images[0].get_pixel(0, 0), &Rgba([1, 60, 0, 255]));
}

#[test]
fn slices_preserve_header_order() {
    let result = run(
        vec![text_page(&[
            ("Question 1", 100.0),
            ("Question 2", 400.0),
            ("Question 3", 700.0),
        ])],
        None,
    );
    let slices = &result.trace.pages[0].slices;
    assert_eq!(slices.len(), 3);
    for pair in slices.windows(2) {
        assert!(pair[0].y_start < pair[1].y_start);
        assert!(pair[0].y_end < pair[1].y_end);
        assert!(pair[0].y_end <= pair[1].y_start + 40.0);
    }
}

#[test]
fn question_continued_on_later_page_is_merged() {
    let result = run(
        vec![
            text_page(&[("Question 1", 100.0)]),
            text_page(&[("Question 2", 100.0)]),
            empty_page(),
            empty_page(),
            text_page(&[("Question 2 continued", 100.0)]),
        ],
        None,
    );

    assert_eq!(numbers(&result), vec![1, 2]);
    let q2 = &result.questions[1];
    assert_eq!(q2.page, 2);
    assert_eq!(q2.part_count(), 2);
    let img = q2.image.as_ref().unwrap();
    assert_eq!(img.dimensions(), (600, 1480));
    assert_eq!(img.get_pixel(0, 0).0[0], 2);
    assert_eq!(img.get_pixel(0, 740).0[0], 5);
}

#[test]
fn marks_annotation_is_not_a_header() {
    let mut page = text_page(&[("Question 1", 100.0)]);
    if let Some(tokens) = page.tokens.as_mut() {
        tokens.extend(line("(10)", 520.0, 300.0, 14.0));
        tokens.extend(line("Explain the difference between TCP and UDP.", 40.0, 140.0, 10.0));
    }
    let result = run(vec![page], None);

    assert_eq!(numbers(&result), vec![1]);
    assert_eq!(result.questions[0].coordinates.y_end, 800.0);
}

#[test]
fn close_candidates_for_same_question_collapse() {
    // Sparse text page: recognition runs and finds the same header 10px lower.
    let recognizer = MockRecognizer::default().with_header(1, "Question 4", 210.0);
    let result = run(
        vec![text_page(&[("Question 4", 200.0)])],
        Some(&recognizer),
    );

    assert_eq!(recognizer.calls(), 1);
    let page = &result.trace.pages[0];
    assert_eq!(page.text_headers, 1);
    assert_eq!(page.ocr_headers, 1);
    assert_eq!(page.kept_headers.len(), 1);
    // recognition candidate scores higher (tall, left-aligned keyword line)
    assert_eq!(page.kept_headers[0].source, HeaderSource::Ocr);
    assert_eq!(result.questions[0].coordinates.y_start, 170.0);
}

#[test]
fn degenerate_slice_is_dropped() {
    let result = run(
        vec![text_page(&[("Question 1", 10.0), ("Question 2", 40.0)])],
        None,
    );

    // question 1 would span 0..24
    assert_eq!(numbers(&result), vec![2]);
    let page = &result.trace.pages[0];
    assert_eq!(page.degenerate_count(), 1);
    assert!(page
        .steps
        .iter()
        .any(|s| s.step_type == TraceStepType::DegenerateSlice));
}

// ---------------------------------------------------------------------------
// Recognition fallback
// ---------------------------------------------------------------------------
#[test]
fn page_without_text_invokes_recognition_once() {
    let recognizer = MockRecognizer::default().with_header(1, "QUESTION 1", 100.0);
    let result = run(vec![empty_page()], Some(&recognizer));

    assert_eq!(recognizer.calls(), 1);
    assert_eq!(numbers(&result), vec![1]);
    assert_eq!(result.trace.ocr_pages_used, 1);
    assert_eq!(result.trace.recognizer.as_deref(), Some("mock-ocr"));
}

#[test]
fn dense_page_with_headers_skips_recognition() {
    let mut page = text_page(&[("Question 1", 100.0)]);
    if let Some(tokens) = page.tokens.as_mut() {
        for i in 0..10 {
            tokens.extend(line("some body text on this line", 40.0, 150.0 + 20.0 * i as f32, 10.0));
        }
    }
    let recognizer = MockRecognizer::default();
    let result = run(vec![page], Some(&recognizer));

    assert_eq!(recognizer.calls(), 0);
    assert_eq!(numbers(&result), vec![1]);
}

#[test]
fn recognition_cap_is_enforced() {
    let mut recognizer = MockRecognizer::default();
    for page in 1..=8 {
        recognizer = recognizer.with_header(page, &format!("Question {page}"), 100.0);
    }
    let result = run(vec![empty_page(); 8], Some(&recognizer));

    assert_eq!(recognizer.calls(), 6);
    assert_eq!(numbers(&result), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(result.trace.ocr_pages_used, 6);
    let page7 = result.trace.page(7).unwrap();
    assert!(!page7.ocr_attempted);
    assert!(page7
        .steps
        .iter()
        .any(|s| s.step_type == TraceStepType::OcrSkipped));
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------
#[test]
fn corrupt_document_is_fatal() {
    let opener = MockOpener {
        doc: MockDocument { pages: vec![] },
    };
    let err = segment_pdf(b"not a pdf", &opener, None, &config(), &NoProgress).unwrap_err();
    assert!(matches!(err, PapercutError::DocumentOpen(_)));
}

#[test]
fn no_headers_is_an_empty_result() {
    let result = run(
        vec![text_page(&[("Department of Computer Science", 50.0)])],
        None,
    );
    assert!(result.nothing_found());
    assert!(result.is_empty());
    assert_eq!(result.trace.pages.len(), 1);
}

#[test]
fn extraction_failure_falls_through_to_recognition() {
    let broken = MockPage {
        tokens: None,
        render_fails: false,
    };
    let recognizer = MockRecognizer::default().with_header(1, "Q1", 100.0);
    let result = run(
        vec![broken.clone(), text_page(&[("Question 2", 100.0)])],
        Some(&recognizer),
    );
    assert_eq!(numbers(&result), vec![1, 2]);

    let result = run(vec![broken, text_page(&[("Question 2", 100.0)])], None);
    assert_eq!(numbers(&result), vec![2]);
    assert_eq!(result.trace.warnings.len(), 1);
    assert_eq!(result.trace.warnings[0].page_number, Some(1));
}

#[test]
fn recognition_failure_skips_only_that_page() {
    let recognizer = MockRecognizer {
        failing_pages: vec![1],
        ..MockRecognizer::default()
    }
    .with_header(1, "Question 1", 100.0)
    .with_header(2, "Question 2", 100.0);
    let result = run(vec![empty_page(), empty_page()], Some(&recognizer));

    assert_eq!(recognizer.calls(), 2);
    assert_eq!(numbers(&result), vec![2]);
    assert_eq!(result.trace.warnings.len(), 1);
}

#[test]
fn sparse_page_keeps_text_headers_when_recognition_fails() {
    let recognizer = MockRecognizer {
        failing_pages: vec![1],
        ..MockRecognizer::default()
    };
    let page = text_page(&[("Question 1", 100.0), ("Question 2", 500.0)]);
    let result = run(vec![page], Some(&recognizer));

    assert_eq!(recognizer.calls(), 1);
    assert_eq!(numbers(&result), vec![1, 2]);
    assert_eq!(result.trace.warnings.len(), 1);
    let page1 = result.trace.page(1).unwrap();
    assert!(page1.ocr_attempted);
    assert_eq!(page1.text_headers, 2);
}

#[test]
fn render_failure_skips_only_that_page() {
    let mut bad = text_page(&[("Question 1", 100.0)]);
    bad.render_fails = true;
    let result = run(vec![bad, text_page(&[("Question 2", 100.0)])], None);
    assert_eq!(numbers(&result), vec![2]);
}

#[test]
fn cancellation_between_pages() {
    let doc = MockDocument {
        pages: vec![
            text_page(&[("Question 1", 100.0)]),
            text_page(&[("Question 2", 100.0)]),
        ],
    };
    let cancel = CancelFlag::new();
    let seen = RefCell::new(Vec::new());
    let progress = |msg: &str| {
        seen.borrow_mut().push(msg.to_string());
        cancel.cancel();
    };
    let err = segment_document(&doc, None, &config(), &progress, Some(&cancel)).unwrap_err();

    assert!(matches!(err, PapercutError::Cancelled));
    assert_eq!(seen.borrow().as_slice(), ["Processing page 1 of 2"]);
}

#[test]
fn progress_reports_pages_and_recognition() {
    let recognizer = MockRecognizer::default();
    let opener = MockOpener {
        doc: MockDocument {
            pages: vec![empty_page(), text_page(&[("Question 1", 100.0)])],
        },
    };
    let seen = RefCell::new(Vec::new());
    let progress = |msg: &str| seen.borrow_mut().push(msg.to_string());
    segment_pdf(b"%PDF-1.4", &opener, Some(&recognizer), &config(), &progress).unwrap();

    let seen = seen.into_inner();
    assert_eq!(seen[0], "Processing page 1 of 2");
    assert_eq!(seen[1], "OCR page 1 (1/6)");
    assert_eq!(seen[2], "Processing page 2 of 2");
}

// ---------------------------------------------------------------------------
// Crop correction on a segmented document
// ---------------------------------------------------------------------------
#[test]
fn crop_session_replaces_question_image() {
    let doc = MockDocument {
        pages: vec![
            text_page(&[("Question 1", 100.0), ("Question 2", 500.0)]),
            text_page(&[("Question 3", 100.0)]),
        ],
    };
    let cfg = config();
    let mut result = segment_document(&doc, None, &cfg, &NoProgress, None).unwrap();

    let target = CropTarget {
        kind: CropTargetKind::Question,
        index: 0,
    };
    let mut session = CropSession::open(&doc, target, &result.questions[0], Some(300.0), &cfg).unwrap();
    // 60..484 natural, shown at half size
    assert_eq!(session.rect().y, 30.0);
    assert_eq!(session.rect().h, 212.0);

    session.drag(Handle::S, 0.0, 100.0);
    session.add_slice();
    session.change_page(&doc, 2).unwrap();
    let outcome = session.save().unwrap();
    apply_crop(&mut result.questions, &mut [], outcome).unwrap();

    let q1 = &result.questions[0];
    assert_eq!(q1.part_count(), 2);
    // 30..100 display = 60..200 natural, then 200 display = 400 natural on page 2
    assert_eq!(q1.image_size(), Some((600, 540)));
    assert_eq!(q1.image.as_ref().unwrap().get_pixel(0, 139).0[0], 1);
    assert_eq!(q1.image.as_ref().unwrap().get_pixel(0, 140).0[0], 2);
}
