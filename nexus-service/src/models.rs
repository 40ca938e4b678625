use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const ACCEPTED_MIME_TYPES: [&str; 4] = [PDF_MIME, "text/plain", "text/markdown", DOCX_MIME];
const ACCEPTED_EXTENSIONS: [&str; 4] = [".pdf", ".txt", ".md", ".docx"];

/// A user-selected file: name, declared type and raw content
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: Option<String>,
    pub content: Bytes,
}

impl UploadFile {
    pub fn new(
        name: impl Into<String>,
        mime_type: Option<String>,
        content: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.filter(|m| !m.trim().is_empty()),
            content: content.into(),
        }
    }

    /// Declared MIME type without parameters such as `; charset=utf-8`
    pub fn essence(&self) -> Option<String> {
        self.mime_type.as_deref().map(|m| {
            m.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    fn has_extension(&self, ext: &str) -> bool {
        self.name.to_ascii_lowercase().ends_with(ext)
    }

    /// Whether the file may enter the pipeline at all. Checked by declared
    /// type first, then by extension; content is never sniffed.
    pub fn is_accepted(&self) -> bool {
        let by_type = self
            .essence()
            .is_some_and(|m| ACCEPTED_MIME_TYPES.contains(&m.as_str()));
        by_type || ACCEPTED_EXTENSIONS.iter().any(|ext| self.has_extension(ext))
    }

    /// Pick an extraction strategy. First match wins.
    pub fn format(&self) -> DocumentFormat {
        let essence = self.essence();
        match essence.as_deref() {
            Some(PDF_MIME) => DocumentFormat::Pdf,
            Some(DOCX_MIME) => DocumentFormat::Docx,
            _ if self.has_extension(".docx") => DocumentFormat::Docx,
            _ => DocumentFormat::PlainText,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    PlainText,
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pdf => "PDF",
            Self::Docx => "DOCX",
            Self::PlainText => "plain text",
        })
    }
}

/// Non-empty text pulled out of an uploaded document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedText(String);

impl ExtractedText {
    /// `None` when the text holds nothing but whitespace
    pub fn new(text: String) -> Option<Self> {
        if text.trim().is_empty() {
            None
        } else {
            Some(Self(text))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantitativeMetric {
    pub label: String,
    /// Expected on a 0-100 scale
    pub value: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptNode {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub importance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepDiveSection {
    pub title: String,
    pub simplified_explanation: String,
    pub technical_detail: String,
    pub key_takeaway: String,
}

/// The knowledge object rendered by the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredAnalysis {
    pub title: String,
    pub authors: Vec<String>,
    pub publication_date: String,
    pub executive_summary: String,
    pub metrics: Vec<QuantitativeMetric>,
    pub concepts: Vec<ConceptNode>,
    pub sections: Vec<DeepDiveSection>,
    pub future_implications: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StateResponse {
    pub run_id: Option<String>,
    pub phase: String,
    pub progress: Option<String>,
    pub message: Option<String>,
    pub analysis: Option<StructuredAnalysis>,
}
