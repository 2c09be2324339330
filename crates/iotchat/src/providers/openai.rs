use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::base::{CompletionOptions, Provider, Usage};
use super::configs::OpenAiProviderConfig;
use super::utils::{create_openai_request_payload, parse_completion, post_chat_completion};
use crate::models::message::Message;

pub const OPENAI_HOST: &str = "https://api.openai.com";
pub const OPENAI_MODEL: &str = "gpt-4o";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
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
        tracing::debug!(
            model = %self.config.model,
            structured = options.response_schema.is_some(),
            "OpenAI completion"
        );

        let response = post_chat_completion(
            &self.client,
            &self.config.host,
            Some(&self.config.api_key),
            &payload,
        )
        .await?;
        parse_completion(&response, "OpenAI")
    }
}
