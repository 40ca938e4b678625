use std::time::Duration;
use thiserror::Error;

use crate::models::DocumentFormat;

/// File content could not be turned into text
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Failed to decode {format} document: {message}")]
    Decode {
        format: DocumentFormat,
        message: String,
    },

    #[error("No text content found in {format} document")]
    NoText { format: DocumentFormat },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Extraction worker failed: {0}")]
    Worker(String),
}

impl ExtractionError {
    pub fn decode(format: DocumentFormat, err: impl ToString) -> Self {
        Self::Decode {
            format,
            message: err.to_string(),
        }
    }
}

/// The model's reply parsed but does not describe a usable analysis
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Required field '{0}' is missing")]
    MissingField(String),

    #[error("Field '{field}' is {value}, expected a value in [0, 100]")]
    OutOfRange { field: String, value: f64 },

    #[error("Field '{field}' should be a {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },

    #[error("Concept id '{0}' appears more than once")]
    DuplicateConceptId(String),
}

/// The remote analysis call failed or returned something unusable
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("empty response")]
    EmptyResponse,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Analysis service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Response is not valid analysis JSON: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    #[error("No response within {0:?}")]
    Timeout(Duration),

    #[error("Invalid analysis: {0}")]
    Validation(#[from] ValidationError),
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// An event the orchestrator refuses to act on
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    #[error("Unsupported format. Accepted formats: PDF, DOCX, TXT, MD.")]
    UnsupportedFormat {
        name: String,
        mime_type: Option<String>,
    },

    #[error("A document is already being processed ({phase})")]
    Busy { phase: &'static str },

    #[error("Cannot {event} while {phase}")]
    InvalidTransition {
        phase: &'static str,
        event: &'static str,
    },
}
