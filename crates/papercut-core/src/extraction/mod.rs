pub mod poppler;

use crate::error::PapercutError;
use crate::model::{PageSize, TextToken};
use image::RgbaImage;
use std::process::Command;

/// An opened document. Pages are numbered from 1.
pub trait DocumentSource {
    fn page_count(&self) -> usize;

    /// Page dimensions in PDF points.
    fn page_size(&self, page: usize) -> Result<PageSize, PapercutError>;

    /// Positioned text tokens of one page, in bottom-left PDF space.
    fn text_tokens(&self, page: usize) -> Result<Vec<TextToken>, PapercutError>;

    /// Render one page to a bitmap at `scale` (1.0 = one pixel per point).
    fn render(&self, page: usize, scale: f32) -> Result<RgbaImage, PapercutError>;
}

/// Factory for document sources, configured once at construction.
pub trait DocumentOpener: Send + Sync {
    /// Open a document from its bytes. Fails with `DocumentOpen` if the
    /// bytes are not a readable document.
    fn open(&self, pdf_bytes: &[u8]) -> Result<Box<dyn DocumentSource>, PapercutError>;

    /// Name of this backend (for diagnostics).
    fn backend_name(&self) -> &str;
}

/// Check a page number against a document's page count.
pub fn check_page(doc: &dyn DocumentSource, page: usize) -> Result<(), PapercutError> {
    if page == 0 || page > doc.page_count() {
        return Err(PapercutError::PageExtraction {
            page,
            reason: format!("page out of range (document has {} pages)", doc.page_count()),
        });
    }
    Ok(())
}

/// Run a prepared tool command and return its stdout.
pub(crate) fn run_tool(mut cmd: Command, tool: &str) -> Result<String, PapercutError> {
    let output = cmd.output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PapercutError::ToolNotFound {
                tool: tool.to_string(),
            }
        } else {
            PapercutError::Io(e)
        }
    })?;

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        return Err(PapercutError::ToolFailed {
            tool: tool.to_string(),
            code,
            stderr,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
