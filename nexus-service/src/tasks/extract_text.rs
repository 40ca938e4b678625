use async_trait::async_trait;
use nexus_flow::{Context, FlowError, NextAction, Result, Task, TaskResult};
use std::sync::Arc;
use tracing::{info, warn};

use super::session_keys;
use crate::{models::UploadFile, reader::DocumentReader};

/// First pipeline step: uploaded file → plain text
pub struct ExtractTextTask {
    reader: Arc<DocumentReader>,
}

impl ExtractTextTask {
    pub const ID: &'static str = "extract_text";

    pub fn new(reader: Arc<DocumentReader>) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl Task for ExtractTextTask {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let upload: Arc<UploadFile> = context
            .attachment(session_keys::UPLOAD)
            .ok_or_else(|| FlowError::ContextError("Upload not found in context".to_string()))?;

        info!(file = %upload.name, bytes = upload.content.len(), "Starting text extraction");

        let text = self.reader.read(&upload).await.map_err(|e| {
            warn!(file = %upload.name, error = %e, "Text extraction failed");
            FlowError::task_failed(self.id(), e)
        })?;

        let status = format!(
            "Extracted {} characters from {}",
            text.as_str().chars().count(),
            upload.format()
        );
        context.set(session_keys::EXTRACTED_TEXT, &text).await?;

        Ok(TaskResult::new_with_status(
            None,
            NextAction::Continue,
            Some(status),
        ))
    }
}
