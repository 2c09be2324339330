use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::chat::{last_user_query, ChatMessage};

/// Request options forwarded from the chat UI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetadata {
    pub model: Option<String>,
    #[serde(default)]
    pub web_search: bool,
}

/// Everything a stage sees about the current request
#[derive(Debug, Clone, Default)]
pub struct AgentContext {
    pub messages: Vec<ChatMessage>,
    pub user_query: String,
    pub metadata: RequestMetadata,
}

impl AgentContext {
    /// Build a context whose query is the text of the last user message
    pub fn new(messages: Vec<ChatMessage>, metadata: RequestMetadata) -> Self {
        let user_query = last_user_query(&messages);
        Self {
            messages,
            user_query,
            metadata,
        }
    }

    /// A context holding a single user prompt
    pub fn from_prompt<S: Into<String>>(prompt: S) -> Self {
        Self::new(vec![ChatMessage::user(prompt)], RequestMetadata::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AgentKind {
    Orchestrator,
    TemperatureProvider,
    LedControlProvider,
    SensorAttributesProvider,
    ResponseFormatter,
}

impl AgentKind {
    /// Prefix used when tagging errors raised by the stage
    pub fn label(&self) -> &'static str {
        match self {
            AgentKind::Orchestrator => "Orchestrator",
            AgentKind::TemperatureProvider => "TemperatureProvider",
            AgentKind::LedControlProvider => "LedControlProvider",
            AgentKind::SensorAttributesProvider => "SensorAttributesProvider",
            AgentKind::ResponseFormatter => "ResponseFormatter",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of one pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_agent: Option<AgentKind>,
}

impl<T> AgentResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
            next_agent: None,
        }
    }

    pub fn failure<S: Into<String>>(error: S) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(error.into()),
            next_agent: None,
        }
    }

    pub fn with_message<S: Into<String>>(mut self, message: S) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_next_agent(mut self, next_agent: AgentKind) -> Self {
        self.next_agent = Some(next_agent);
        self
    }
}
