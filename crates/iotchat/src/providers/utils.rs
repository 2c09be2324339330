use anyhow::{anyhow, Result};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use super::base::{CompletionOptions, Usage};
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;

/// Convert internal Message format to OpenAI's API message specification
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .filter_map(|message| {
            let text = message.text();
            if text.is_empty() {
                return None;
            }
            Some(json!({
                "role": message.role,
                "content": text,
            }))
        })
        .collect()
}

/// Build a chat completions payload, the system message always goes first
pub fn create_openai_request_payload(
    model: &str,
    system: &str,
    messages: &[Message],
    options: &CompletionOptions,
    default_temperature: Option<f32>,
    max_tokens: Option<i32>,
) -> Value {
    let mut messages_array = vec![json!({
        "role": "system",
        "content": system
    })];
    messages_array.extend(messages_to_openai_spec(messages));

    let mut payload = serde_json::Map::new();
    payload.insert("model".to_string(), json!(model));
    payload.insert("messages".to_string(), json!(messages_array));

    if let Some(temp) = options.temperature.or(default_temperature) {
        payload.insert("temperature".to_string(), json!(temp));
    }
    if let Some(tokens) = max_tokens {
        payload.insert("max_tokens".to_string(), json!(tokens));
    }
    if let Some(schema) = &options.response_schema {
        payload.insert(
            "response_format".to_string(),
            json!({
                "type": "json_schema",
                "json_schema": {
                    "name": schema.name,
                    "schema": schema.schema,
                    "strict": true
                }
            }),
        );
    }

    Value::Object(payload)
}

/// Convert OpenAI's API response to internal Message format
pub fn openai_response_to_message(response: &Value) -> Result<Message> {
    let original = response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| anyhow!("No message in response: {}", response))?;

    let mut content = Vec::new();
    if let Some(text) = original.get("content").and_then(Value::as_str) {
        content.push(MessageContent::text(text));
    }
    if let Some(refusal) = original.get("refusal").and_then(Value::as_str) {
        content.push(MessageContent::refusal(refusal));
    }

    Ok(Message {
        role: Role::Assistant,
        created: chrono::Utc::now().timestamp(),
        content,
    })
}

pub fn get_openai_usage(data: &Value) -> Result<Usage> {
    let usage = data
        .get("usage")
        .ok_or_else(|| anyhow!("No usage data in response"))?;

    let input_tokens = usage
        .get("prompt_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    let output_tokens = usage
        .get("completion_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    let total_tokens = usage
        .get("total_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32)
        .or_else(|| match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => Some(input + output),
            _ => None,
        });

    Ok(Usage::new(input_tokens, output_tokens, total_tokens))
}

#[derive(Debug, thiserror::Error)]
#[error("Context length exceeded. Message: {0}")]
pub struct ContextLengthExceededError(String);

pub fn check_openai_context_length_error(error: &Value) -> Option<ContextLengthExceededError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Some(ContextLengthExceededError(message))
    } else {
        None
    }
}

/// POST to `/v1/chat/completions`; rate limits and 5xx are reported as server errors
pub async fn post_chat_completion(
    client: &Client,
    host: &str,
    bearer: Option<&str>,
    payload: &Value,
) -> Result<Value> {
    let url = format!("{}/v1/chat/completions", host.trim_end_matches('/'));
    let mut request = client.post(&url).json(payload);
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }

    let response = request.send().await?;
    let status = response.status();
    tracing::debug!(%url, %status, "Chat completion response");

    if status == StatusCode::OK {
        return Ok(response.json().await?);
    }
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return Err(anyhow!("Server error: {}", status));
    }
    let body = response.text().await.unwrap_or_default();
    Err(anyhow!("Request failed: {}\n{}", status, body))
}

/// Message and usage from a completion body. An `error` field fails the call.
pub fn parse_completion(response: &Value, vendor: &str) -> Result<(Message, Usage)> {
    if let Some(error) = response.get("error") {
        if let Some(err) = check_openai_context_length_error(error) {
            return Err(err.into());
        }
        return Err(anyhow!("{} API error: {}", vendor, error));
    }

    let message = openai_response_to_message(response)?;
    let usage = get_openai_usage(response).unwrap_or_default();
    Ok((message, usage))
}

/// Pull a JSON object out of model text that may be fenced or surrounded by prose
pub fn extract_json(content: &str) -> &str {
    let trimmed = content.trim();

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return trimmed;
    }

    if let Some(start) = trimmed.find("```") {
        let after_ticks = &trimmed[start + 3..];
        if let Some(end) = after_ticks.find("```") {
            let block = &after_ticks[..end];
            // Drop the language tag line, if any
            return match block.find('\n') {
                Some(newline) => block[newline..].trim(),
                None => block.trim(),
            };
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if end > start {
            return &trimmed[start..=end];
        }
    }

    trimmed
}
