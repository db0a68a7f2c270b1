use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PapercutError {
    #[error("could not open document: {0}")]
    DocumentOpen(String),

    #[error("text extraction failed on page {page}: {reason}")]
    PageExtraction { page: usize, reason: String },

    #[error("text recognition failed on page {page}: {reason}")]
    PageRecognition { page: usize, reason: String },

    #[error("rendering failed on page {page}: {reason}")]
    Render { page: usize, reason: String },

    #[error("{tool} not found. Install poppler-utils and tesseract-ocr (apt) or poppler and tesseract (brew)")]
    ToolNotFound { tool: String },

    #[error("{tool} failed with exit code {code}: {stderr}")]
    ToolFailed {
        tool: String,
        code: i32,
        stderr: String,
    },

    #[error("failed to load config from {path}: {reason}")]
    ConfigLoad { path: PathBuf, reason: String },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("crop failed: {0}")]
    Crop(String),

    #[error("segmentation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl PapercutError {
    /// Whether the orchestrator can recover from this error by skipping the
    /// page it happened on.
    pub fn is_page_local(&self) -> bool {
        matches!(
            self,
            PapercutError::PageExtraction { .. }
                | PapercutError::PageRecognition { .. }
                | PapercutError::Render { .. }
        )
    }
}
