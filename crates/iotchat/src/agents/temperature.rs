use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::{extract, AgentContext, AgentKind, Specialist, SpecialistRun, ToolInvocation};
use crate::providers::base::{Provider, ResponseSchema};
use crate::tools::{DeviceTools, TemperatureParams, ToolData, ToolName};

#[derive(Debug, Deserialize)]
struct TemperatureRequest {
    #[serde(rename = "needsIoTData")]
    needs_iot_data: bool,
    #[serde(rename = "entityId", default)]
    entity_id: Option<String>,
    #[serde(default)]
    keys: Option<String>,
    #[serde(rename = "useStrictDataTypes", default)]
    use_strict_data_types: Option<bool>,
}

fn schema() -> ResponseSchema {
    ResponseSchema::new(
        "temperature_request",
        json!({
            "type": "object",
            "properties": {
                "needsIoTData": {
                    "type": "boolean",
                    "description": "Whether the user is asking for IoT sensor data (temperature, humidity, etc.)"
                },
                "entityId": {
                    "type": ["string", "null"],
                    "description": "The entity ID of the device, null for the default device"
                },
                "keys": {
                    "type": ["string", "null"],
                    "description": "Comma-separated telemetry keys, null unless named by the user"
                },
                "useStrictDataTypes": {
                    "type": ["boolean", "null"],
                    "description": "Whether to request typed telemetry values"
                }
            },
            "required": ["needsIoTData", "entityId", "keys", "useStrictDataTypes"],
            "additionalProperties": false
        }),
    )
}

/// Reads the latest temperature telemetry
pub struct TemperatureAgent {
    provider: Arc<dyn Provider>,
    tools: DeviceTools,
}

impl TemperatureAgent {
    pub fn new(provider: Arc<dyn Provider>, tools: DeviceTools) -> Self {
        Self { provider, tools }
    }
}

#[async_trait]
impl Specialist for TemperatureAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::TemperatureProvider
    }

    async fn handle(&self, context: &AgentContext) -> SpecialistRun {
        let prompt = format!("User query: \"{}\"", context.user_query);
        let request: TemperatureRequest =
            match extract(self.provider.as_ref(), "temperature.md", &prompt, schema()).await {
                Ok(request) => request,
                Err(e) => return SpecialistRun::failed(self.kind(), e),
            };
        tracing::info!(?request, "Temperature request extracted");

        if !request.needs_iot_data {
            tracing::info!("Query is not about sensor data, returning to orchestrator");
            return SpecialistRun::not_relevant("Query is not related to IoT sensor data");
        }

        let params = TemperatureParams {
            entity_id: request.entity_id.filter(|id| !id.is_empty()),
            keys: request.keys.filter(|keys| !keys.is_empty()),
            use_strict_data_types: request.use_strict_data_types,
        };
        let input = serde_json::to_value(&params).unwrap_or_default();
        let result = self
            .tools
            .get_temperature(params)
            .await
            .into_result()
            .map(ToolData::Temperature);

        SpecialistRun::from_tool(
            ToolInvocation::new(ToolName::GetTemperature, input, result),
            |_| "IoT sensor data retrieved successfully".to_string(),
        )
    }
}
