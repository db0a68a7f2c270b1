use crate::error::PapercutError;
use crate::extraction::{check_page, run_tool, DocumentOpener, DocumentSource};
use crate::model::{PageSize, TextToken};
use image::RgbaImage;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

/// Locations of the poppler-utils binaries.
#[derive(Debug, Clone)]
pub struct PopplerConfig {
    pub pdfinfo: PathBuf,
    pub pdftotext: PathBuf,
    pub pdftoppm: PathBuf,
}

impl Default for PopplerConfig {
    fn default() -> Self {
        PopplerConfig {
            pdfinfo: PathBuf::from("pdfinfo"),
            pdftotext: PathBuf::from("pdftotext"),
            pdftoppm: PathBuf::from("pdftoppm"),
        }
    }
}

/// Document backend built on poppler-utils.
///
/// `pdfinfo` supplies page count and sizes, `pdftotext -bbox` the word
/// boxes, and `pdftoppm` the rendering.
pub struct PopplerOpener {
    config: PopplerConfig,
}

impl PopplerOpener {
    pub fn new(config: PopplerConfig) -> Self {
        PopplerOpener { config }
    }

    /// Check if the poppler binaries are available on the system.
    pub fn is_available(&self) -> bool {
        [&self.config.pdfinfo, &self.config.pdftotext, &self.config.pdftoppm]
            .iter()
            .all(|bin| {
                Command::new(bin)
                    .arg("-v")
                    .output()
                    .map(|o| o.status.success() || !o.stderr.is_empty())
                    .unwrap_or(false)
            })
    }
}

impl Default for PopplerOpener {
    fn default() -> Self {
        Self::new(PopplerConfig::default())
    }
}

impl DocumentOpener for PopplerOpener {
    fn open(&self, pdf_bytes: &[u8]) -> Result<Box<dyn DocumentSource>, PapercutError> {
        let mut file = tempfile::Builder::new()
            .suffix(".pdf")
            .tempfile()
            .map_err(|e| PapercutError::DocumentOpen(e.to_string()))?;
        file.write_all(pdf_bytes)
            .map_err(|e| PapercutError::DocumentOpen(e.to_string()))?;

        let mut cmd = Command::new(&self.config.pdfinfo);
        cmd.arg(file.path());
        let info = run_tool(cmd, "pdfinfo").map_err(into_open_error)?;
        let page_count = parse_page_count(&info).ok_or_else(|| {
            PapercutError::DocumentOpen("pdfinfo did not report a page count".into())
        })?;
        if page_count == 0 {
            return Err(PapercutError::DocumentOpen("document has no pages".into()));
        }

        let mut cmd = Command::new(&self.config.pdfinfo);
        cmd.args(["-f", "1", "-l"])
            .arg(page_count.to_string())
            .arg(file.path());
        let sized = run_tool(cmd, "pdfinfo").map_err(into_open_error)?;
        let page_sizes = parse_page_sizes(&sized, page_count);

        log::info!("opened document with {} pages via poppler", page_count);

        Ok(Box::new(PopplerDocument {
            file,
            config: self.config.clone(),
            page_sizes,
        }))
    }

    fn backend_name(&self) -> &str {
        "poppler"
    }
}

/// A document written to a temporary file for the poppler tools.
pub struct PopplerDocument {
    file: tempfile::NamedTempFile,
    config: PopplerConfig,
    page_sizes: Vec<Option<PageSize>>,
}

impl DocumentSource for PopplerDocument {
    fn page_count(&self) -> usize {
        self.page_sizes.len()
    }

    fn page_size(&self, page: usize) -> Result<PageSize, PapercutError> {
        check_page(self, page)?;
        self.page_sizes[page - 1].ok_or_else(|| PapercutError::PageExtraction {
            page,
            reason: "pdfinfo did not report a size for this page".into(),
        })
    }

    fn text_tokens(&self, page: usize) -> Result<Vec<TextToken>, PapercutError> {
        check_page(self, page)?;
        let n = page.to_string();
        let mut cmd = Command::new(&self.config.pdftotext);
        cmd.args(["-bbox", "-f", n.as_str(), "-l", n.as_str()])
            .arg(self.file.path())
            .arg("-");
        let xml = run_tool(cmd, "pdftotext").map_err(|e| PapercutError::PageExtraction {
            page,
            reason: e.to_string(),
        })?;
        parse_bbox_xhtml(&xml, page)
    }

    fn render(&self, page: usize, scale: f32) -> Result<RgbaImage, PapercutError> {
        check_page(self, page)?;
        let render_error = |reason: String| PapercutError::Render { page, reason };

        let dir = tempfile::tempdir().map_err(|e| render_error(e.to_string()))?;
        let prefix = dir.path().join("page");
        let n = page.to_string();
        let dpi = format!("{:.2}", 72.0 * scale);

        let mut cmd = Command::new(&self.config.pdftoppm);
        cmd.args(["-png", "-r", dpi.as_str(), "-f", n.as_str(), "-l", n.as_str(), "-singlefile"])
            .arg(self.file.path())
            .arg(&prefix);
        run_tool(cmd, "pdftoppm").map_err(|e| render_error(e.to_string()))?;

        let png = prefix.with_extension("png");
        let bitmap = image::open(&png)
            .map_err(|e| render_error(format!("could not read {}: {}", png.display(), e)))?
            .to_rgba8();
        log::debug!(
            "rendered page {} at scale {} -> {}x{}",
            page,
            scale,
            bitmap.width(),
            bitmap.height()
        );
        Ok(bitmap)
    }
}

fn into_open_error(e: PapercutError) -> PapercutError {
    match e {
        PapercutError::ToolNotFound { .. } => e,
        other => PapercutError::DocumentOpen(other.to_string()),
    }
}

fn parse_page_count(info: &str) -> Option<usize> {
    info.lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|rest| rest.trim().parse().ok())
}

/// Parse "Page    3 size: 595.276 x 841.89 pts (A4)" lines.
fn parse_page_sizes(info: &str, page_count: usize) -> Vec<Option<PageSize>> {
    let mut sizes = vec![None; page_count];
    for line in info.lines() {
        let Some(rest) = line.strip_prefix("Page") else {
            continue;
        };
        let Some((num, dims)) = rest.split_once("size:") else {
            continue;
        };
        let Ok(page) = num.trim().parse::<usize>() else {
            continue;
        };
        let mut parts = dims.split_whitespace();
        let width = parts.next().and_then(|w| w.parse::<f32>().ok());
        let _x = parts.next();
        let height = parts.next().and_then(|h| h.parse::<f32>().ok());
        if let (Some(width), Some(height)) = (width, height) {
            if (1..=page_count).contains(&page) {
                sizes[page - 1] = Some(PageSize { width, height });
            }
        }
    }
    // Without -f/-l pdfinfo prints one size for the whole document.
    if sizes.iter().all(Option::is_none) {
        if let Some(size) = parse_document_size(info) {
            sizes.iter_mut().for_each(|s| *s = Some(size));
        }
    }
    sizes
}

fn parse_document_size(info: &str) -> Option<PageSize> {
    let dims = info
        .lines()
        .find_map(|line| line.strip_prefix("Page size:"))?;
    let mut parts = dims.split_whitespace();
    let width = parts.next()?.parse().ok()?;
    parts.next();
    let height = parts.next()?.parse().ok()?;
    Some(PageSize { width, height })
}

#[derive(Debug, Clone, Copy)]
struct WordBox {
    x_min: f32,
    y_min: f32,
    y_max: f32,
}

/// Parse `pdftotext -bbox` output into tokens.
///
/// Word boxes are top-down; tokens are flipped into bottom-left PDF space
/// using the page height, with the box bottom as the baseline.
fn parse_bbox_xhtml(xml: &str, page: usize) -> Result<Vec<TextToken>, PapercutError> {
    let xml_error = |reason: String| PapercutError::PageExtraction { page, reason };

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut tokens = Vec::new();
    let mut page_height = 0.0_f32;
    let mut current: Option<WordBox> = None;
    let mut word = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"page" => page_height = attr_f32(&e, b"height").unwrap_or(0.0),
                b"word" => {
                    current = Some(WordBox {
                        x_min: attr_f32(&e, b"xMin").unwrap_or(0.0),
                        y_min: attr_f32(&e, b"yMin").unwrap_or(0.0),
                        y_max: attr_f32(&e, b"yMax").unwrap_or(0.0),
                    });
                    word.clear();
                }
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if current.is_some() {
                    let text = t.unescape().map_err(|e| xml_error(e.to_string()))?;
                    word.push_str(&text);
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"word" => {
                if let Some(b) = current.take() {
                    let text = word.trim();
                    if !text.is_empty() {
                        tokens.push(TextToken::new(
                            text,
                            b.x_min,
                            page_height - b.y_max,
                            b.y_max - b.y_min,
                        ));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e.to_string())),
            _ => {}
        }
    }

    Ok(tokens)
}

fn attr_f32(e: &BytesStart<'_>, name: &[u8]) -> Option<f32> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| std::str::from_utf8(&a.value).ok()?.parse().ok())
}
