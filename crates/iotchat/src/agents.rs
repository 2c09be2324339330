//! The agent pipeline: an orchestrator classifies the query, at most one
//! specialist extracts parameters and calls its device tool, and the
//! formatter phrases the reply.
pub mod context;
pub mod formatter;
pub mod led_control;
pub mod orchestrator;
pub mod sensor_attributes;
pub mod temperature;

pub use context::{AgentContext, AgentKind, AgentResponse, RequestMetadata};
pub use formatter::{FormattedReply, ResponseFormatter};
pub use led_control::LedControlAgent;
pub use orchestrator::{
    Intent, IntentClassification, Orchestrator, OrchestratorReply, PipelineTrace,
};
pub use sensor_attributes::SensorAttributesAgent;
pub use temperature::TemperatureAgent;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::{AgentError, AgentResult};
use crate::prompt_template::load_prompt_file;
use crate::providers::base::{Provider, ResponseSchema};
use crate::providers::structured::generate_object;
use crate::tools::{ToolData, ToolName};

/// One device tool call as shown to the chat UI
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub tool_name: ToolName,
    pub tool_call_id: String,
    pub input: Value,
    pub result: Result<ToolData, String>,
}

impl ToolInvocation {
    pub fn new(tool_name: ToolName, input: Value, result: Result<ToolData, String>) -> Self {
        Self {
            tool_name,
            tool_call_id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            input,
            result,
        }
    }
}

/// What a specialist produced, with the tool call when one was made
#[derive(Debug, Clone)]
pub struct SpecialistRun {
    pub response: AgentResponse<ToolData>,
    pub invocation: Option<ToolInvocation>,
}

impl SpecialistRun {
    /// The query is not for this specialist, hand it back to the orchestrator
    pub fn not_relevant<S: Into<String>>(reason: S) -> Self {
        Self {
            response: AgentResponse::failure(reason).with_next_agent(AgentKind::Orchestrator),
            invocation: None,
        }
    }

    /// Parameter extraction failed before any tool ran
    pub fn failed(kind: AgentKind, error: AgentError) -> Self {
        tracing::error!(agent = %kind, %error, "Specialist failed");
        Self {
            response: AgentResponse::failure(format!("{} error: {}", kind, error))
                .with_next_agent(AgentKind::ResponseFormatter),
            invocation: None,
        }
    }

    pub fn from_tool<F>(invocation: ToolInvocation, success_message: F) -> Self
    where
        F: FnOnce(&ToolData) -> String,
    {
        let response = match &invocation.result {
            Ok(data) => AgentResponse::success(data.clone()).with_message(success_message(data)),
            Err(error) => AgentResponse::failure(error.clone()),
        };
        Self {
            response: response.with_next_agent(AgentKind::ResponseFormatter),
            invocation: Some(invocation),
        }
    }
}

/// A stage that checks relevance and calls exactly one device tool
#[async_trait]
pub trait Specialist: Send + Sync {
    fn kind(&self) -> AgentKind;

    async fn handle(&self, context: &AgentContext) -> SpecialistRun;
}

pub(crate) fn render_system(template: &str) -> AgentResult<String> {
    load_prompt_file(template, &serde_json::json!({}))
        .map_err(|e| AgentError::Internal(e.to_string()))
}

/// Structured extraction with a bundled system prompt
pub(crate) async fn extract<T: DeserializeOwned>(
    provider: &dyn Provider,
    system_template: &str,
    prompt: &str,
    schema: ResponseSchema,
) -> AgentResult<T> {
    let system = render_system(system_template)?;
    generate_object(provider, &system, prompt, schema).await
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::message::Message;
    use crate::providers::mock::MockProvider;
    use crate::thingsboard::client::tests::client_for;
    use crate::tools::DeviceTools;
    use std::sync::Arc;
    use wiremock::MockServer;

    /// Tools backed by `server` with `dev-1` as the default device
    pub(crate) async fn tools_for(server: &MockServer) -> DeviceTools {
        DeviceTools::new(Arc::new(client_for(server, "dev-1").await))
    }

    /// A mock provider replying with the given JSON documents and texts in order
    pub(crate) fn scripted(replies: Vec<String>) -> Arc<MockProvider> {
        Arc::new(MockProvider::new(
            replies
                .into_iter()
                .map(|reply| Message::assistant().with_text(reply))
                .collect(),
        ))
    }

    #[test]
    fn test_tool_call_ids_are_unique() {
        let a = ToolInvocation::new(ToolName::ControlLed, Value::Null, Err("x".to_string()));
        let b = ToolInvocation::new(ToolName::ControlLed, Value::Null, Err("x".to_string()));
        assert!(a.tool_call_id.starts_with("call_"));
        assert_ne!(a.tool_call_id, b.tool_call_id);
    }

    #[test]
    fn test_tool_failure_routes_to_formatter() {
        let invocation = ToolInvocation::new(
            ToolName::GetTemperature,
            Value::Null,
            Err("TemperatureTool error: boom".to_string()),
        );
        let run = SpecialistRun::from_tool(invocation, |_| unreachable!());
        assert!(!run.response.success);
        assert_eq!(run.response.error.as_deref(), Some("TemperatureTool error: boom"));
        assert_eq!(run.response.next_agent, Some(AgentKind::ResponseFormatter));
        assert!(run.invocation.is_some());
    }

    #[test]
    fn test_extraction_failure_is_tagged() {
        let run = SpecialistRun::failed(
            AgentKind::LedControlProvider,
            AgentError::Extraction("bad json".to_string()),
        );
        assert_eq!(
            run.response.error.as_deref(),
            Some("LedControlProvider error: Could not extract structured output: bad json")
        );
        assert!(run.invocation.is_none());
    }
}
