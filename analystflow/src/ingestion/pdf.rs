//! PDF text extraction.

use std::fmt::Debug;
use std::sync::Arc;

/// Marker inserted before each page's text.
#[must_use]
pub fn page_marker(page: usize) -> String {
    format!("\n--- Page {page} ---\n")
}

/// Placeholder for a page without extractable text.
pub const NO_PAGE_TEXT: &str = "[No extractable text on this page]";

/// Extracts per-page text from PDF bytes.
pub trait PdfExtractor: Send + Sync + Debug {
    /// Returns the text of every page in order.
    ///
    /// # Errors
    ///
    /// Returns a reason if the document is corrupt or encrypted.
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>, String>;
}

/// Joins page texts with page markers.
///
/// Returns `None` when no page has any text.
#[must_use]
pub fn assemble_pages(pages: &[String]) -> Option<String> {
    if pages.iter().all(|page| page.trim().is_empty()) {
        return None;
    }

    let mut out = String::new();
    for (idx, page) in pages.iter().enumerate() {
        out.push_str(&page_marker(idx + 1));
        if page.trim().is_empty() {
            out.push_str(NO_PAGE_TEXT);
        } else {
            out.push_str(page);
        }
    }
    Some(out)
}

/// Extractor backed by `lopdf`.
#[cfg(feature = "pdf")]
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

#[cfg(feature = "pdf")]
impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>, String> {
        let document = lopdf::Document::load_mem(bytes).map_err(|e| e.to_string())?;
        if document.is_encrypted() {
            return Err("document is password-protected".to_string());
        }

        Ok(document
            .get_pages()
            .keys()
            .map(|&number| {
                document.extract_text(&[number]).unwrap_or_else(|err| {
                    tracing::debug!(page = number, error = %err, "Page text extraction failed");
                    String::new()
                })
            })
            .collect())
    }
}

/// Extractor used when PDF support is compiled out.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedPdf;

impl PdfExtractor for UnsupportedPdf {
    fn extract_pages(&self, _bytes: &[u8]) -> Result<Vec<String>, String> {
        Err("PDF support is not enabled in this build".to_string())
    }
}

/// Returns the extractor for this build.
#[must_use]
pub fn default_extractor() -> Arc<dyn PdfExtractor> {
    #[cfg(feature = "pdf")]
    {
        Arc::new(LopdfExtractor)
    }
    #[cfg(not(feature = "pdf"))]
    {
        Arc::new(UnsupportedPdf)
    }
}
