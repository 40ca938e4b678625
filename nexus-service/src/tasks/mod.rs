pub mod analyze_document;
pub mod extract_text;

pub use analyze_document::AnalyzeDocumentTask;
pub use extract_text::ExtractTextTask;

/// Keys under which the ingestion tasks share data
pub mod session_keys {
    /// The uploaded file, stored as an attachment
    pub const UPLOAD: &str = "upload";
    pub const EXTRACTED_TEXT: &str = "extracted_text";
    /// `Arc<StructuredAnalysis>` attachment, set by the last step
    pub const ANALYSIS: &str = "analysis";
}
