pub mod docx;
pub mod pdf;

use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    error::ExtractionError,
    models::{DocumentFormat, ExtractedText, UploadFile},
};

pub use docx::{DocxDecoder, DocxRsDecoder};
pub use pdf::{LopdfDecoder, PagedDocument, PdfDecoder};

/// Pages past this one are never read
pub const MAX_PDF_PAGES: u32 = 10;

/// Turns an uploaded file into plain text using the strategy its declared
/// type or name selects
#[derive(Clone)]
pub struct DocumentReader {
    pdf: Arc<dyn PdfDecoder>,
    docx: Arc<dyn DocxDecoder>,
    max_pdf_pages: u32,
}

impl DocumentReader {
    pub fn new(pdf: Arc<dyn PdfDecoder>, docx: Arc<dyn DocxDecoder>) -> Self {
        Self {
            pdf,
            docx,
            max_pdf_pages: MAX_PDF_PAGES,
        }
    }

    pub async fn read(&self, file: &UploadFile) -> Result<ExtractedText, ExtractionError> {
        let format = file.format();
        debug!(
            file = %file.name,
            mime_type = ?file.mime_type,
            %format,
            bytes = file.content.len(),
            "Selected extraction strategy"
        );

        let text = match format {
            DocumentFormat::Pdf => {
                let decoder = Arc::clone(&self.pdf);
                let bytes = file.content.clone();
                let max_pages = self.max_pdf_pages;
                run_blocking(move || {
                    let document = decoder.decode(&bytes)?;
                    if document.page_count() > max_pages {
                        debug!(
                            pages = document.page_count(),
                            max_pages, "Reading only the leading pages of the PDF"
                        );
                    }
                    pdf::render_pages(&*document, max_pages)
                })
                .await?
            }
            DocumentFormat::Docx => {
                let decoder = Arc::clone(&self.docx);
                let bytes = file.content.clone();
                run_blocking(move || decoder.raw_text(&bytes)).await?
            }
            DocumentFormat::PlainText => String::from_utf8_lossy(&file.content).into_owned(),
        };

        let text = ExtractedText::new(text).ok_or(ExtractionError::NoText { format })?;
        info!(
            file = %file.name,
            %format,
            chars = text.as_str().chars().count(),
            "Extracted document text"
        );
        Ok(text)
    }
}

impl Default for DocumentReader {
    fn default() -> Self {
        Self::new(Arc::new(LopdfDecoder), Arc::new(DocxRsDecoder))
    }
}

async fn run_blocking<F>(work: F) -> Result<String, ExtractionError>
where
    F: FnOnce() -> Result<String, ExtractionError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ExtractionError::Worker(e.to_string()))?
}
