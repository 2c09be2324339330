use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use super::{
    extract, AgentContext, AgentKind, AgentResponse, FormattedReply, LedControlAgent,
    ResponseFormatter, SensorAttributesAgent, Specialist, TemperatureAgent, ToolInvocation,
};
use crate::errors::AgentResult;
use crate::providers::base::{Provider, ResponseSchema};
use crate::tools::DeviceTools;

/// Classifications at or below this confidence are treated as general chat
pub const CONFIDENCE_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    IotSensorQuery,
    LedControl,
    SensorAttributes,
    GeneralChat,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentClassification {
    pub intent: Intent,
    pub confidence: f64,
    #[serde(rename = "needsIoTData")]
    pub needs_iot_data: bool,
    pub needs_led_control: bool,
    pub needs_sensor_attributes: bool,
    #[serde(default)]
    pub reasoning: String,
}

impl IntentClassification {
    /// The specialist to run, attributes first, then LED, then sensor data
    pub fn route(&self) -> Option<AgentKind> {
        if self.confidence <= CONFIDENCE_THRESHOLD {
            return None;
        }
        if self.needs_sensor_attributes || self.intent == Intent::SensorAttributes {
            Some(AgentKind::SensorAttributesProvider)
        } else if self.needs_led_control || self.intent == Intent::LedControl {
            Some(AgentKind::LedControlProvider)
        } else if self.needs_iot_data || self.intent == Intent::IotSensorQuery {
            Some(AgentKind::TemperatureProvider)
        } else {
            None
        }
    }

    fn schema() -> ResponseSchema {
        ResponseSchema::new(
            "intent_classification",
            json!({
                "type": "object",
                "properties": {
                    "intent": {
                        "type": "string",
                        "enum": ["iot_sensor_query", "led_control", "sensor_attributes", "general_chat", "other"],
                        "description": "The type of user intent"
                    },
                    "confidence": {
                        "type": "number",
                        "description": "Confidence in the intent classification, between 0 and 1"
                    },
                    "needsIoTData": {
                        "type": "boolean",
                        "description": "Whether this query requires IoT sensor data"
                    },
                    "needsLedControl": {
                        "type": "boolean",
                        "description": "Whether this query requires LED control (turn on/off)"
                    },
                    "needsSensorAttributes": {
                        "type": "boolean",
                        "description": "Whether this query requires sensor attributes, status or configuration"
                    },
                    "reasoning": {
                        "type": "string",
                        "description": "Brief explanation of the classification"
                    }
                },
                "required": [
                    "intent",
                    "confidence",
                    "needsIoTData",
                    "needsLedControl",
                    "needsSensorAttributes",
                    "reasoning"
                ],
                "additionalProperties": false
            }),
        )
    }
}

/// What happened on the way to the reply, replayed to the chat UI
#[derive(Debug, Clone, Default)]
pub struct PipelineTrace {
    pub classification: Option<IntentClassification>,
    pub route: Option<AgentKind>,
    pub tool: Option<ToolInvocation>,
}

impl PipelineTrace {
    pub fn reasoning(&self) -> Option<&str> {
        self.classification
            .as_ref()
            .map(|c| c.reasoning.as_str())
            .filter(|r| !r.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorReply {
    pub response: AgentResponse<FormattedReply>,
    pub trace: PipelineTrace,
}

/// Entry point of the pipeline
pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    temperature: TemperatureAgent,
    led_control: LedControlAgent,
    sensor_attributes: SensorAttributesAgent,
    formatter: ResponseFormatter,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn Provider>, tools: DeviceTools) -> Self {
        Self {
            temperature: TemperatureAgent::new(provider.clone(), tools.clone()),
            led_control: LedControlAgent::new(provider.clone(), tools.clone()),
            sensor_attributes: SensorAttributesAgent::new(provider.clone(), tools),
            formatter: ResponseFormatter::new(provider.clone()),
            provider,
        }
    }

    pub async fn classify(&self, context: &AgentContext) -> AgentResult<IntentClassification> {
        let prompt = format!("Classify this user query: \"{}\"", context.user_query);
        extract(
            self.provider.as_ref(),
            "orchestrator.md",
            &prompt,
            IntentClassification::schema(),
        )
        .await
    }

    fn specialist(&self, kind: AgentKind) -> Option<&dyn Specialist> {
        match kind {
            AgentKind::TemperatureProvider => Some(&self.temperature),
            AgentKind::LedControlProvider => Some(&self.led_control),
            AgentKind::SensorAttributesProvider => Some(&self.sensor_attributes),
            AgentKind::Orchestrator | AgentKind::ResponseFormatter => None,
        }
    }

    /// Classify, run at most one specialist, and format the answer
    pub async fn run(&self, context: &AgentContext) -> OrchestratorReply {
        tracing::info!(query = %context.user_query, "Analyzing user intent");
        let mut trace = PipelineTrace::default();

        let classification = match self.classify(context).await {
            Ok(classification) => classification,
            Err(e) => {
                tracing::error!(error = %e, "Intent classification failed");
                return OrchestratorReply {
                    response: AgentResponse::failure(format!(
                        "{} error: {}",
                        AgentKind::Orchestrator,
                        e
                    ))
                    .with_message("Sorry, there was a problem processing your query."),
                    trace,
                };
            }
        };
        tracing::info!(
            intent = ?classification.intent,
            confidence = classification.confidence,
            needs_iot_data = classification.needs_iot_data,
            needs_led_control = classification.needs_led_control,
            needs_sensor_attributes = classification.needs_sensor_attributes,
            reasoning = %classification.reasoning,
            "Intent classified"
        );

        let route = classification.route();
        trace.classification = Some(classification);

        let Some(specialist) = route.and_then(|kind| self.specialist(kind)) else {
            tracing::info!("Routing to formatter as general chat");
            let response = self.formatter.format(context, None, None).await;
            return OrchestratorReply { response, trace };
        };

        tracing::info!(agent = %specialist.kind(), "Routing to specialist");
        trace.route = Some(specialist.kind());
        let run = specialist.handle(context).await;
        trace.tool = run.invocation;

        let response = if run.response.next_agent == Some(AgentKind::Orchestrator) {
            tracing::info!(
                agent = %specialist.kind(),
                "Specialist declined, answering as general chat"
            );
            self.formatter.format(context, None, None).await
        } else if let (true, Some(data)) = (run.response.success, run.response.data.as_ref()) {
            self.formatter.format(context, Some(data), None).await
        } else {
            let error = run.response.error.as_deref().unwrap_or("Unknown error");
            self.formatter.format(context, None, Some(error)).await
        };
        OrchestratorReply { response, trace }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::tests::{scripted, tools_for};
    use crate::providers::mock::MockProvider;
    use crate::tools::{ToolData, ToolName};
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn classification(
        intent: &str,
        confidence: f64,
        iot: bool,
        led: bool,
        attrs: bool,
    ) -> IntentClassification {
        serde_json::from_value(json!({
            "intent": intent,
            "confidence": confidence,
            "needsIoTData": iot,
            "needsLedControl": led,
            "needsSensorAttributes": attrs,
            "reasoning": "test"
        }))
        .unwrap()
    }

    #[test]
    fn test_low_confidence_never_routes() {
        for confidence in [0.0, 0.5, 0.7] {
            for intent in ["iot_sensor_query", "led_control", "sensor_attributes"] {
                let c = classification(intent, confidence, true, true, true);
                assert_eq!(c.route(), None, "{} at {}", intent, confidence);
            }
        }
    }

    #[test]
    fn test_route_priority() {
        assert_eq!(
            classification("iot_sensor_query", 0.9, true, true, true).route(),
            Some(AgentKind::SensorAttributesProvider)
        );
        assert_eq!(
            classification("iot_sensor_query", 0.9, true, true, false).route(),
            Some(AgentKind::LedControlProvider)
        );
        assert_eq!(
            classification("iot_sensor_query", 0.9, false, false, false).route(),
            Some(AgentKind::TemperatureProvider)
        );
        assert_eq!(
            classification("led_control", 0.95, false, false, false).route(),
            Some(AgentKind::LedControlProvider)
        );
        assert_eq!(classification("general_chat", 0.99, false, false, false).route(), None);
        assert_eq!(classification("other", 0.99, false, false, false).route(), None);
    }

    #[tokio::test]
    async fn test_low_confidence_falls_back_to_general_chat() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/plugins/telemetry/dev-1/SHARED_SCOPE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let provider = scripted(vec![
            json!({
                "intent": "led_control",
                "confidence": 0.6,
                "needsIoTData": false,
                "needsLedControl": true,
                "needsSensorAttributes": false,
                "reasoning": "maybe about a light"
            })
            .to_string(),
            "Happy to help!".to_string(),
        ]);
        let orchestrator = Orchestrator::new(provider.clone(), tools_for(&server).await);

        let reply = orchestrator.run(&AgentContext::from_prompt("lights?")).await;
        assert!(reply.response.success);
        assert_eq!(reply.response.message.as_deref(), Some("Happy to help!"));
        assert_eq!(reply.trace.reasoning(), Some("maybe about a light"));
        assert!(reply.trace.route.is_none());
        assert!(reply.trace.tool.is_none());

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0].messages[0].text(),
            "Classify this user query: \"lights?\""
        );
        assert!(requests[1].messages[0]
            .text()
            .contains("Please provide a general helpful response"));
    }

    #[tokio::test]
    async fn test_led_command_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/plugins/telemetry/dev-1/SHARED_SCOPE"))
            .and(body_json(json!({"ledState": true})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let provider = scripted(vec![
            json!({
                "intent": "led_control",
                "confidence": 0.95,
                "needsIoTData": false,
                "needsLedControl": true,
                "needsSensorAttributes": false,
                "reasoning": "explicit LED command"
            })
            .to_string(),
            json!({
                "needsLedControl": true,
                "ledAction": "turn_on",
                "entityId": null,
                "reasoning": "turn on"
            })
            .to_string(),
            "Done, the LED is now on.".to_string(),
        ]);
        let orchestrator = Orchestrator::new(provider.clone(), tools_for(&server).await);

        let reply = orchestrator
            .run(&AgentContext::from_prompt("Turn on the LED"))
            .await;
        assert!(reply.response.success);
        assert_eq!(reply.response.message.as_deref(), Some("Done, the LED is now on."));
        assert_eq!(reply.trace.route, Some(AgentKind::LedControlProvider));

        let tool = reply.trace.tool.unwrap();
        assert_eq!(tool.tool_name, ToolName::ControlLed);
        assert!(matches!(tool.result, Ok(ToolData::Led(ref outcome)) if outcome.led_state));

        let formatter_prompt = provider.requests()[2].messages[0].text();
        assert!(formatter_prompt.contains("- LED State: ON"));
    }

    #[tokio::test]
    async fn test_declined_specialist_answers_as_general_chat() {
        let server = MockServer::start().await;
        let provider = scripted(vec![
            json!({
                "intent": "iot_sensor_query",
                "confidence": 0.8,
                "needsIoTData": true,
                "needsLedControl": false,
                "needsSensorAttributes": false,
                "reasoning": "mentions sensors"
            })
            .to_string(),
            json!({
                "needsIoTData": false,
                "entityId": null,
                "keys": null,
                "useStrictDataTypes": null
            })
            .to_string(),
            "Sensors are neat.".to_string(),
        ]);
        let orchestrator = Orchestrator::new(provider.clone(), tools_for(&server).await);

        let reply = orchestrator
            .run(&AgentContext::from_prompt("what is a sensor?"))
            .await;
        assert!(reply.response.success);
        assert_eq!(reply.trace.route, Some(AgentKind::TemperatureProvider));
        assert!(reply.trace.tool.is_none());
        assert!(provider.requests()[2]
            .messages[0]
            .text()
            .contains("general helpful response"));
    }

    #[tokio::test]
    async fn test_tool_failure_is_formatted_as_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/plugins/telemetry/DEVICE/dev-1/values/attributes"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
            .mount(&server)
            .await;

        let provider = scripted(vec![
            json!({
                "intent": "sensor_attributes",
                "confidence": 0.9,
                "needsIoTData": false,
                "needsLedControl": false,
                "needsSensorAttributes": true,
                "reasoning": "device status"
            })
            .to_string(),
            json!({
                "needsSensorAttributes": true,
                "entityId": null,
                "reasoning": "status"
            })
            .to_string(),
            "Sorry, I could not reach the device.".to_string(),
        ]);
        let orchestrator = Orchestrator::new(provider.clone(), tools_for(&server).await);

        let reply = orchestrator
            .run(&AgentContext::from_prompt("device status"))
            .await;
        assert!(reply.response.success);
        let tool = reply.trace.tool.unwrap();
        assert!(tool.result.unwrap_err().starts_with("SensorAttributesTool error:"));
        assert!(provider.requests()[2]
            .messages[0]
            .text()
            .contains("There was an error: SensorAttributesTool error:"));
    }

    #[tokio::test]
    async fn test_classification_failure() {
        let server = MockServer::start().await;
        let provider = Arc::new(MockProvider::with_results(vec![Err(
            "invalid api key".to_string()
        )]));
        let orchestrator = Orchestrator::new(provider, tools_for(&server).await);

        let reply = orchestrator.run(&AgentContext::from_prompt("hi")).await;
        assert!(!reply.response.success);
        assert!(reply
            .response
            .error
            .unwrap()
            .starts_with("Orchestrator error:"));
        assert_eq!(
            reply.response.message.as_deref(),
            Some("Sorry, there was a problem processing your query.")
        );
        assert!(reply.trace.classification.is_none());
    }
}
