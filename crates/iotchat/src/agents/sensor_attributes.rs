use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::{extract, AgentContext, AgentKind, Specialist, SpecialistRun, ToolInvocation};
use crate::providers::base::{Provider, ResponseSchema};
use crate::tools::{DeviceTools, SensorAttributesParams, ToolData, ToolName};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttributesRequest {
    needs_sensor_attributes: bool,
    #[serde(default)]
    entity_id: Option<String>,
    #[serde(default)]
    reasoning: String,
}

fn schema() -> ResponseSchema {
    ResponseSchema::new(
        "attributes_request",
        json!({
            "type": "object",
            "properties": {
                "needsSensorAttributes": {
                    "type": "boolean",
                    "description": "Whether the user is asking for device attributes, status or configuration"
                },
                "entityId": {
                    "type": ["string", "null"],
                    "description": "The entity ID of the device, null for the default device"
                },
                "reasoning": {
                    "type": "string",
                    "description": "Brief explanation of the attributes classification"
                }
            },
            "required": ["needsSensorAttributes", "entityId", "reasoning"],
            "additionalProperties": false
        }),
    )
}

pub struct SensorAttributesAgent {
    provider: Arc<dyn Provider>,
    tools: DeviceTools,
}

impl SensorAttributesAgent {
    pub fn new(provider: Arc<dyn Provider>, tools: DeviceTools) -> Self {
        Self { provider, tools }
    }
}

#[async_trait]
impl Specialist for SensorAttributesAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::SensorAttributesProvider
    }

    async fn handle(&self, context: &AgentContext) -> SpecialistRun {
        let prompt = format!("User query: \"{}\"", context.user_query);
        let request: AttributesRequest = match extract(
            self.provider.as_ref(),
            "sensor_attributes.md",
            &prompt,
            schema(),
        )
        .await
        {
            Ok(request) => request,
            Err(e) => return SpecialistRun::failed(self.kind(), e),
        };
        tracing::info!(
            needs_sensor_attributes = request.needs_sensor_attributes,
            reasoning = %request.reasoning,
            "Attributes request extracted"
        );

        if !request.needs_sensor_attributes {
            return SpecialistRun::not_relevant("Query is not related to sensor attributes");
        }

        let params = SensorAttributesParams {
            entity_id: request.entity_id.filter(|id| !id.is_empty()),
        };
        let input = serde_json::to_value(&params).unwrap_or_default();
        let result = self
            .tools
            .get_sensor_attributes(params)
            .await
            .into_result()
            .map(ToolData::Attributes);

        SpecialistRun::from_tool(
            ToolInvocation::new(ToolName::GetSensorAttributes, input, result),
            |data| match data {
                ToolData::Attributes(report) => format!(
                    "Sensor attributes retrieved successfully: {} attributes found",
                    report.attribute_count
                ),
                _ => "Sensor attributes retrieved successfully".to_string(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::tests::{scripted, tools_for};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetches_attributes_for_default_device() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/plugins/telemetry/DEVICE/dev-1/values/attributes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"lastUpdateTs": 1, "key": "macAddress", "value": "AA:BB"},
                {"lastUpdateTs": 2, "key": "rssi", "value": -60},
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let provider = scripted(vec![json!({
            "needsSensorAttributes": true,
            "entityId": "",
            "reasoning": "asks for the MAC address"
        })
        .to_string()]);
        let agent = SensorAttributesAgent::new(provider, tools_for(&server).await);

        let run = agent
            .handle(&AgentContext::from_prompt("What's the MAC address?"))
            .await;
        assert!(run.response.success);
        assert_eq!(
            run.response.message.as_deref(),
            Some("Sensor attributes retrieved successfully: 2 attributes found")
        );
        assert_eq!(run.invocation.unwrap().input, json!({"entityId": null}));
    }

    #[tokio::test]
    async fn test_provider_failure_is_tagged() {
        let server = MockServer::start().await;
        let provider = Arc::new(crate::providers::mock::MockProvider::with_results(vec![
            Err("rate limited".to_string()),
        ]));
        let agent = SensorAttributesAgent::new(provider, tools_for(&server).await);

        let run = agent.handle(&AgentContext::from_prompt("device status")).await;
        assert!(!run.response.success);
        assert_eq!(run.response.next_agent, Some(AgentKind::ResponseFormatter));
        let error = run.response.error.unwrap();
        assert!(error.starts_with("SensorAttributesProvider error:"));
        assert!(error.contains("rate limited"));
    }
}
