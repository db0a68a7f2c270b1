pub mod commit;
pub mod config;
pub mod crop;
pub mod error;
pub mod extraction;
pub mod header;
pub mod layout;
pub mod model;
pub mod ocr;
pub mod raster;
pub mod segment;
pub mod slice;
pub mod trace;

use config::SegmentConfig;
use error::PapercutError;
use extraction::DocumentOpener;
use ocr::TextRecognizer;
use segment::{ProgressSink, SegmentationResult, Segmenter};

/// Main API entry point: split an exam or memo PDF into one image per
/// question.
///
/// A document that cannot be opened is the only fatal outcome; failures on
/// individual pages are recovered and show up in the returned trace. An
/// empty result means nothing was detected.
pub fn segment_pdf(
    pdf_bytes: &[u8],
    opener: &dyn DocumentOpener,
    recognizer: Option<&dyn TextRecognizer>,
    config: &SegmentConfig,
    progress: &dyn ProgressSink,
) -> Result<SegmentationResult, PapercutError> {
    config::validate_config(config)?;

    // Anything that stops the document from opening is reported as one
    // fatal error.
    let doc = opener.open(pdf_bytes).map_err(|e| match e {
        PapercutError::DocumentOpen(_) | PapercutError::ToolNotFound { .. } => e,
        other => PapercutError::DocumentOpen(other.to_string()),
    })?;

    let mut segmenter = Segmenter::new(config).with_progress(progress);
    if let Some(r) = recognizer {
        segmenter = segmenter.with_recognizer(r);
    }
    let mut result = segmenter.run(doc.as_ref())?;
    result.trace.backend = opener.backend_name().to_string();

    if result.nothing_found() {
        log::info!("no questions detected in {} page(s)", result.trace.page_count);
    }
    Ok(result)
}
