use async_trait::async_trait;
use rig::providers::gemini;

use super::EngineError;
use super::config::GenerationConfig;

/// Opaque remote text generation. One call, no internal retry.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, EngineError>;
}

/// Wrapper around the LLM client
pub struct LlmClient {
    client: gemini::Client,
    settings: GenerationConfig,
}

impl LlmClient {
    pub fn new(api_key: &str, settings: GenerationConfig) -> Self {
        Self {
            client: gemini::Client::new(api_key),
            settings,
        }
    }

    pub fn settings(&self) -> &GenerationConfig {
        &self.settings
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, prompt: &str) -> Result<String, EngineError> {
        use rig::client::CompletionClient;
        use rig::completion::Prompt;

        let agent = self
            .client
            .agent(&self.settings.model)
            .temperature(self.settings.temperature)
            .max_tokens(self.settings.max_tokens)
            .build();

        let response = tokio::time::timeout(self.settings.timeout, agent.prompt(prompt))
            .await
            .map_err(|_| EngineError::Timeout(self.settings.timeout))?
            .map_err(|e| EngineError::Generation(e.to_string()))?;

        if response.trim().is_empty() {
            return Err(EngineError::Generation("model returned an empty response".into()));
        }

        tracing::debug!(
            model = %self.settings.model,
            chars = response.len(),
            "generation complete"
        );
        Ok(response)
    }
}
