use async_trait::async_trait;
use nexus_flow::{Context, FlowError, NextAction, Result, Task, TaskResult};
use std::sync::Arc;
use tracing::{info, warn};

use super::session_keys;
use crate::{analysis::AnalysisClient, models::ExtractedText};

/// Second pipeline step: extracted text → structured analysis
pub struct AnalyzeDocumentTask {
    client: Arc<AnalysisClient>,
}

impl AnalyzeDocumentTask {
    pub const ID: &'static str = "analyze_document";

    pub fn new(client: Arc<AnalysisClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Task for AnalyzeDocumentTask {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let text: ExtractedText = context
            .get(session_keys::EXTRACTED_TEXT)
            .await
            .ok_or_else(|| {
                FlowError::ContextError("Extracted text not found in context".to_string())
            })?;

        info!(chars = text.as_str().chars().count(), "Starting document analysis");

        let analysis = self.client.analyze(&text).await.map_err(|e| {
            warn!(error = %e, "Document analysis failed");
            FlowError::task_failed(self.id(), e)
        })?;

        let status = format!(
            "Analysis ready: {} metrics, {} concepts, {} sections",
            analysis.metrics.len(),
            analysis.concepts.len(),
            analysis.sections.len()
        );
        context.attach(session_keys::ANALYSIS, Arc::new(analysis));

        Ok(TaskResult::new_with_status(
            None,
            NextAction::End,
            Some(status),
        ))
    }
}
