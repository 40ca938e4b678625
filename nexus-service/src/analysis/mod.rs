pub mod gemini;
pub mod openrouter;
pub mod prompt;
pub mod validate;

use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

use crate::{
    error::AnalysisError,
    models::{ExtractedText, StructuredAnalysis},
};

pub use gemini::GeminiBackend;
pub use openrouter::OpenRouterBackend;
pub use validate::{ValidationPolicy, parse_analysis};

/// Characters of document text sent to the model; the rest is dropped
pub const MAX_ANALYSIS_CHARS: usize = 30_000;

/// Everything a backend needs for one call
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub system_instruction: &'static str,
    /// Document text, already truncated
    pub document_text: String,
}

/// One round trip to a generative model. Returns the raw reply body.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &AnalysisRequest) -> Result<String, AnalysisError>;
}

/// Sends document text to a backend and turns the reply into a
/// [`StructuredAnalysis`]
#[derive(Clone)]
pub struct AnalysisClient {
    backend: Arc<dyn AnalysisBackend>,
    policy: ValidationPolicy,
    timeout: Duration,
}

impl AnalysisClient {
    pub fn new(backend: Arc<dyn AnalysisBackend>, policy: ValidationPolicy, timeout: Duration) -> Self {
        Self {
            backend,
            policy,
            timeout,
        }
    }

    pub async fn analyze(&self, text: &ExtractedText) -> Result<StructuredAnalysis, AnalysisError> {
        let request = AnalysisRequest {
            system_instruction: prompt::SYSTEM_INSTRUCTION,
            document_text: truncate_chars(text.as_str(), MAX_ANALYSIS_CHARS).to_string(),
        };
        debug!(
            backend = self.backend.name(),
            sent_bytes = request.document_text.len(),
            original_bytes = text.as_str().len(),
            "Dispatching analysis request"
        );

        let reply = tokio::time::timeout(self.timeout, self.backend.generate(&request))
            .await
            .map_err(|_| AnalysisError::Timeout(self.timeout))??;

        let analysis = parse_analysis(&reply, self.policy)?;
        info!(
            backend = self.backend.name(),
            title = %analysis.title,
            "Analysis completed"
        );
        Ok(analysis)
    }
}

/// Longest prefix of `text` holding at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}
