use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::base::{CompletionOptions, Provider, Usage};
use super::configs::OllamaProviderConfig;
use super::utils::{create_openai_request_payload, parse_completion, post_chat_completion};
use crate::models::message::Message;

pub const OLLAMA_HOST: &str = "http://localhost:11434";
pub const OLLAMA_MODEL: &str = "qwen2.5";

/// Local models can be slow to load
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Ollama through its OpenAI compatible endpoint, no credentials
pub struct OllamaProvider {
    client: Client,
    config: OllamaProviderConfig,
}

impl OllamaProvider {
    pub fn new(config: OllamaProviderConfig) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<(Message, Usage)> {
        let payload = create_openai_request_payload(
            &self.config.model,
            system,
            messages,
            options,
            self.config.temperature,
            self.config.max_tokens,
        );
        tracing::debug!(model = %self.config.model, "Ollama completion");

        let response = post_chat_completion(&self.client, &self.config.host, None, &payload).await?;
        parse_completion(&response, "Ollama")
    }
}
