use lopdf::Document;
use std::fmt::Write as _;

use crate::{error::ExtractionError, models::DocumentFormat};

/// Decodes PDF bytes into a document whose pages can be read one at a time
pub trait PdfDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn PagedDocument>, ExtractionError>;
}

/// A decoded, paged document
pub trait PagedDocument {
    fn page_count(&self) -> u32;

    /// Text tokens of a page, numbered from 1
    fn page_tokens(&self, page_number: u32) -> Result<Vec<String>, ExtractionError>;
}

/// Render the first `max_pages` pages, each block headed by its page marker.
///
/// Pages past the cap are dropped without notice to the caller. Fails when
/// not a single processed page carries text.
pub fn render_pages(
    document: &dyn PagedDocument,
    max_pages: u32,
) -> Result<String, ExtractionError> {
    let last_page = document.page_count().min(max_pages);
    let mut text = String::new();
    let mut found_text = false;

    for page_number in 1..=last_page {
        let tokens = document.page_tokens(page_number)?;
        found_text |= !tokens.is_empty();
        // Writing into a String cannot fail
        let _ = writeln!(text, "--- Page {page_number} ---\n{}", tokens.join(" "));
    }

    if !found_text {
        return Err(ExtractionError::NoText {
            format: DocumentFormat::Pdf,
        });
    }
    Ok(text)
}

/// `PdfDecoder` backed by `lopdf`
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfDecoder;

impl PdfDecoder for LopdfDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn PagedDocument>, ExtractionError> {
        let document = Document::load_mem(bytes)
            .map_err(|e| ExtractionError::decode(DocumentFormat::Pdf, e))?;
        let pages = document.get_pages().into_keys().collect();
        Ok(Box::new(LopdfDocument { document, pages }))
    }
}

struct LopdfDocument {
    document: Document,
    pages: Vec<u32>,
}

impl PagedDocument for LopdfDocument {
    fn page_count(&self) -> u32 {
        u32::try_from(self.pages.len()).unwrap_or(u32::MAX)
    }

    fn page_tokens(&self, page_number: u32) -> Result<Vec<String>, ExtractionError> {
        let page = page_number
            .checked_sub(1)
            .and_then(|index| self.pages.get(index as usize))
            .ok_or_else(|| {
                ExtractionError::decode(DocumentFormat::Pdf, format!("no page {page_number}"))
            })?;

        let text = self
            .document
            .extract_text(&[*page])
            .map_err(|e| ExtractionError::decode(DocumentFormat::Pdf, e))?;
        Ok(text.split_whitespace().map(str::to_string).collect())
    }
}
