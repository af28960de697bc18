mod pdf;
mod text;

pub use pdf::PdfHandler;
#[cfg(test)]
pub(crate) use pdf::write_sample_pdf;
pub use text::{TextHandler, paginate};

use crate::error::{AppError, Result};
use std::path::Path;

/// Text pulled out of an uploaded document.
#[derive(Debug, Clone, Default)]
pub struct ExtractedDocument {
    /// Title from document metadata.
    pub title: Option<String>,
    /// Description from document metadata.
    pub description: Option<String>,
    /// Page texts in reading order.
    pub pages: Vec<String>,
}

/// Trait for format-specific text extraction.
pub trait FormatHandler: Send + Sync {
    /// Extract metadata and page texts. `chars_per_page` applies to
    /// formats without their own page structure.
    fn extract(&self, path: &Path, chars_per_page: usize) -> Result<ExtractedDocument>;
}

/// Get the handler for a file based on its extension.
pub fn get_handler(path: &Path) -> Result<Box<dyn FormatHandler>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => Ok(Box::new(PdfHandler)),
        "txt" | "text" | "md" => Ok(Box::new(TextHandler)),
        other => Err(AppError::InvalidInput(format!(
            "Unsupported file type: '{}'",
            other
        ))),
    }
}
