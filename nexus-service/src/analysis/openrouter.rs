use async_trait::async_trait;
use rig::{
    agent::Agent,
    client::CompletionClient,
    completion::Prompt,
    providers::openrouter,
};

use super::{AnalysisBackend, AnalysisRequest, prompt};
use crate::error::AnalysisError;

pub const DEFAULT_MODEL: &str = "openai/gpt-4.1-mini";

/// Analysis through an OpenRouter-hosted model, driven by a `rig` agent.
///
/// OpenRouter has no portable structured-output switch, so the schema goes
/// into the prompt and the reply is validated afterwards.
pub struct OpenRouterBackend {
    agent: Agent<openrouter::CompletionModel>,
    model: String,
}

impl OpenRouterBackend {
    pub fn new(api_key: &str, model: &str) -> Self {
        let client = openrouter::Client::new(api_key);
        let agent = client
            .agent(model)
            .preamble(prompt::SYSTEM_INSTRUCTION)
            .build();
        Self {
            agent,
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl AnalysisBackend for OpenRouterBackend {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &AnalysisRequest) -> Result<String, AnalysisError> {
        let prompt = prompt::build_prompt_with_schema(&request.document_text);
        let reply = self
            .agent
            .prompt(&prompt)
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        if reply.trim().is_empty() {
            return Err(AnalysisError::EmptyResponse);
        }
        Ok(reply)
    }
}
