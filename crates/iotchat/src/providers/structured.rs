use serde::de::DeserializeOwned;

use super::base::{CompletionOptions, Provider, ResponseSchema};
use super::utils::extract_json;
use crate::errors::{AgentError, AgentResult};
use crate::models::message::Message;

/// Ask the model for a JSON object conforming to `schema` and deserialize it
pub async fn generate_object<T: DeserializeOwned>(
    provider: &dyn Provider,
    system: &str,
    prompt: &str,
    schema: ResponseSchema,
) -> AgentResult<T> {
    let options = CompletionOptions::default().with_schema(schema);
    let messages = vec![Message::user().with_text(prompt)];
    let (response, usage) = provider.complete(system, &messages, &options).await?;

    tracing::debug!(?usage, "structured completion finished");

    if let Some(reason) = response.refusal() {
        return Err(AgentError::Extraction(format!("model refused: {}", reason)));
    }

    let text = response.text();
    serde_json::from_str(extract_json(&text))
        .map_err(|e| AgentError::Extraction(format!("{}: {}", e, text)))
}
