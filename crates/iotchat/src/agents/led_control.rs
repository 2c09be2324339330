use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::{extract, AgentContext, AgentKind, Specialist, SpecialistRun, ToolInvocation};
use crate::providers::base::{Provider, ResponseSchema};
use crate::tools::{DeviceTools, LedControlParams, ToolData, ToolName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum LedAction {
    TurnOn,
    TurnOff,
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedRequest {
    needs_led_control: bool,
    led_action: LedAction,
    #[serde(default)]
    entity_id: Option<String>,
    #[serde(default)]
    reasoning: String,
}

fn schema() -> ResponseSchema {
    ResponseSchema::new(
        "led_request",
        json!({
            "type": "object",
            "properties": {
                "needsLedControl": {
                    "type": "boolean",
                    "description": "Whether the user is asking to switch the LED on or off"
                },
                "ledAction": {
                    "type": "string",
                    "enum": ["turn_on", "turn_off", "unknown"],
                    "description": "The action to perform on the LED"
                },
                "entityId": {
                    "type": ["string", "null"],
                    "description": "The entity ID of the device, null for the default device"
                },
                "reasoning": {
                    "type": "string",
                    "description": "Brief explanation of the LED control classification"
                }
            },
            "required": ["needsLedControl", "ledAction", "entityId", "reasoning"],
            "additionalProperties": false
        }),
    )
}

/// Switches the device LED through its `ledState` shared attribute
pub struct LedControlAgent {
    provider: Arc<dyn Provider>,
    tools: DeviceTools,
}

impl LedControlAgent {
    pub fn new(provider: Arc<dyn Provider>, tools: DeviceTools) -> Self {
        Self { provider, tools }
    }
}

#[async_trait]
impl Specialist for LedControlAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::LedControlProvider
    }

    async fn handle(&self, context: &AgentContext) -> SpecialistRun {
        let prompt = format!("User query: \"{}\"", context.user_query);
        let request: LedRequest =
            match extract(self.provider.as_ref(), "led_control.md", &prompt, schema()).await {
                Ok(request) => request,
                Err(e) => return SpecialistRun::failed(self.kind(), e),
            };
        tracing::info!(
            needs_led_control = request.needs_led_control,
            action = ?request.led_action,
            reasoning = %request.reasoning,
            "LED request extracted"
        );

        let led_state = match (request.needs_led_control, request.led_action) {
            (true, LedAction::TurnOn) => true,
            (true, LedAction::TurnOff) => false,
            _ => {
                tracing::info!("Query is not an LED command, returning to orchestrator");
                return SpecialistRun::not_relevant("Query is not related to LED control");
            }
        };

        let params = LedControlParams {
            entity_id: request.entity_id.filter(|id| !id.is_empty()),
            led_state,
        };
        let input = serde_json::to_value(&params).unwrap_or_default();
        let result = self
            .tools
            .control_led(params)
            .await
            .into_result()
            .map(ToolData::Led);

        SpecialistRun::from_tool(
            ToolInvocation::new(ToolName::ControlLed, input, result),
            |_| {
                format!(
                    "LED control executed successfully: {}",
                    if led_state { "ON" } else { "OFF" }
                )
            },
        )
    }
}
