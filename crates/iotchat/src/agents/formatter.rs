use serde::Serialize;
use std::sync::Arc;

use super::{render_system, AgentContext, AgentKind, AgentResponse};
use crate::errors::{AgentError, AgentResult};
use crate::models::message::Message;
use crate::prompt_template::load_prompt_file;
use crate::providers::base::{CompletionOptions, Provider};
use crate::tools::types::AttributeSummary;
use crate::tools::{LedControlOutcome, SensorAttributesReport, TemperatureReading, ToolData};

const FORMATTER_TEMPERATURE: f32 = 0.7;
const APOLOGY: &str = "Sorry, there was a problem processing your query. Please try again.";

/// Payload of a formatted reply
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedReply {
    pub response_data: Option<ToolData>,
    pub original_query: String,
}

#[derive(Serialize)]
struct AttributesView<'a> {
    entity_id: &'a str,
    attribute_count: usize,
    timestamp: &'a str,
    key_facts: Vec<String>,
}

#[derive(Serialize)]
struct FormatterPrompt<'a> {
    user_query: &'a str,
    error: Option<&'a str>,
    temperature: Option<&'a TemperatureReading>,
    led: Option<&'a LedControlOutcome>,
    attributes: Option<AttributesView<'a>>,
}

fn on_off(state: bool) -> &'static str {
    if state {
        "ON"
    } else {
        "OFF"
    }
}

fn key_facts(summary: &AttributeSummary) -> Vec<String> {
    let mut facts = Vec::new();
    if let Some(mac) = &summary.mac_address {
        facts.push(format!("MAC Address: {}", mac));
    }
    if let Some(ip) = &summary.local_ip {
        facts.push(format!("Local IP: {}", ip));
    }
    if let Some(ssid) = &summary.ssid {
        facts.push(format!("WiFi Network: {}", ssid));
    }
    if let Some(rssi) = summary.rssi {
        facts.push(format!("Signal Strength (RSSI): {} dBm", rssi));
    }
    if let Some(state) = summary.led_state {
        facts.push(format!("LED State: {}", on_off(state)));
    }
    if let Some(mode) = summary.led_mode {
        facts.push(format!("LED Mode: {}", mode));
    }
    if let Some(active) = summary.active {
        facts.push(format!("Device Active: {}", if active { "Yes" } else { "No" }));
    }
    facts
}

fn attributes_view(report: &SensorAttributesReport) -> AttributesView<'_> {
    AttributesView {
        entity_id: &report.entity_id,
        attribute_count: report.attribute_count,
        timestamp: &report.timestamp,
        key_facts: key_facts(&report.summary),
    }
}

/// Render the user prompt, an error wins over data
pub fn render_prompt(
    user_query: &str,
    data: Option<&ToolData>,
    error: Option<&str>,
) -> AgentResult<String> {
    let data = if error.is_some() { None } else { data };
    let prompt = FormatterPrompt {
        user_query,
        error,
        temperature: match data {
            Some(ToolData::Temperature(reading)) => Some(reading),
            _ => None,
        },
        led: match data {
            Some(ToolData::Led(outcome)) => Some(outcome),
            _ => None,
        },
        attributes: match data {
            Some(ToolData::Attributes(report)) => Some(attributes_view(report)),
            _ => None,
        },
    };
    load_prompt_file("formatter.md", &prompt).map_err(|e| AgentError::Internal(e.to_string()))
}

/// Phrases the final answer from tool data, a tool error, or nothing at all
pub struct ResponseFormatter {
    provider: Arc<dyn Provider>,
}

impl ResponseFormatter {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    pub async fn format(
        &self,
        context: &AgentContext,
        data: Option<&ToolData>,
        error: Option<&str>,
    ) -> AgentResponse<FormattedReply> {
        tracing::info!(
            has_data = data.is_some(),
            data_type = ?data.map(ToolData::tool_name),
            has_error = error.is_some(),
            "Formatting response"
        );

        match self.generate(context, data, error).await {
            Ok(text) => AgentResponse::success(FormattedReply {
                response_data: data.cloned(),
                original_query: context.user_query.clone(),
            })
            .with_message(text),
            Err(e) => {
                tracing::error!(error = %e, "Formatter failed");
                AgentResponse::failure(format!("{} error: {}", AgentKind::ResponseFormatter, e))
                    .with_message(APOLOGY)
            }
        }
    }

    async fn generate(
        &self,
        context: &AgentContext,
        data: Option<&ToolData>,
        error: Option<&str>,
    ) -> AgentResult<String> {
        let system = render_system("formatter_system.md")?;
        let prompt = render_prompt(&context.user_query, data, error)?;
        let options = CompletionOptions::default().with_temperature(FORMATTER_TEMPERATURE);

        let (message, usage) = self
            .provider
            .complete(&system, &[Message::user().with_text(prompt)], &options)
            .await?;
        tracing::debug!(?usage, "Formatter completion finished");
        Ok(message.text())
    }
}
