use papercut_core::commit::{commit_questions, DirectorySink};
use papercut_core::error::PapercutError;
use papercut_core::extraction::poppler::PopplerOpener;
use papercut_core::ocr::tesseract::TesseractRecognizer;
use papercut_core::ocr::TextRecognizer;
use papercut_core::raster::ImageEncoding;
use std::path::PathBuf;

use crate::output;

pub struct SegmentArgs {
    pub input_file: PathBuf,
    pub config: Option<PathBuf>,
    pub no_ocr: bool,
    pub out_dir: Option<PathBuf>,
    pub output_format: String,
    pub trace: Option<PathBuf>,
    pub jpeg: bool,
}

pub fn run(args: SegmentArgs) -> Result<(), PapercutError> {
    let config = super::load_settings(args.config.as_deref())?;
    let pdf_bytes = std::fs::read(&args.input_file)?;

    let opener = PopplerOpener::default();
    let tesseract = TesseractRecognizer::default();
    let recognizer: Option<&dyn TextRecognizer> = if args.no_ocr {
        None
    } else if tesseract.is_available() {
        Some(&tesseract)
    } else {
        log::warn!("tesseract not found, scanned pages will be skipped");
        None
    };

    let progress = |msg: &str| eprintln!("{msg}");
    let result = papercut_core::segment_pdf(&pdf_bytes, &opener, recognizer, &config, &progress)?;

    if let Some(path) = &args.trace {
        let json = serde_json::to_string_pretty(&result.trace)?;
        std::fs::write(path, json)?;
        eprintln!("Trace written to {}", path.display());
    }

    match args.output_format.as_str() {
        "json" => output::json::print(&result)?,
        _ => output::table::print(&result),
    }

    if result.nothing_found() {
        eprintln!("No questions detected. Check the source file or enter questions manually.");
        return Ok(());
    }

    if let Some(dir) = args.out_dir {
        let encoding = if args.jpeg {
            ImageEncoding::Jpeg { quality: 90 }
        } else {
            ImageEncoding::Png
        };
        let mut sink = DirectorySink::new(dir)?;
        let stored = commit_questions(&result.questions, &mut sink, 1, encoding)?;
        eprintln!(
            "Saved {} question(s) to {}",
            stored.len(),
            sink.dir().display()
        );
    }

    Ok(())
}
