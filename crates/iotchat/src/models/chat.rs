use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::message::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    #[serde(other)]
    Unknown,
}

/// A tool part as rendered by the UI, `type` is `tool-<name>`
#[derive(Debug, Clone, PartialEq)]
pub struct ToolPart {
    pub tool_name: String,
    pub tool_call_id: Option<String>,
    pub state: Option<String>,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub error_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessagePart {
    Text(String),
    Reasoning(String),
    Tool(ToolPart),
    SourceUrl {
        source_id: Option<String>,
        url: String,
        title: Option<String>,
    },
    StepStart,
    /// Any part type we do not interpret, kept as received
    Other(Value),
}

impl MessagePart {
    pub fn from_value(value: Value) -> Self {
        let part_type = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let str_field = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        match part_type.as_str() {
            "text" => MessagePart::Text(str_field("text").unwrap_or_default()),
            "reasoning" => MessagePart::Reasoning(str_field("text").unwrap_or_default()),
            "step-start" => MessagePart::StepStart,
            "source-url" => match str_field("url") {
                Some(url) => MessagePart::SourceUrl {
                    source_id: str_field("sourceId"),
                    url,
                    title: str_field("title"),
                },
                None => MessagePart::Other(value),
            },
            other if other.starts_with("tool-") => MessagePart::Tool(ToolPart {
                tool_name: other.trim_start_matches("tool-").to_string(),
                tool_call_id: str_field("toolCallId"),
                state: str_field("state"),
                input: value.get("input").cloned(),
                output: value.get("output").cloned(),
                error_text: str_field("errorText"),
            }),
            _ => MessagePart::Other(value),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessagePart::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for MessagePart {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(MessagePart::from_value)
    }
}

#[derive(Debug, Deserialize)]
struct IncomingChatMessage {
    #[serde(default)]
    id: Option<String>,
    role: ChatRole,
    #[serde(default)]
    parts: Vec<MessagePart>,
    // Older useChat clients send a flat content string instead of parts
    #[serde(default)]
    content: Option<String>,
}

/// A message as sent by the browser, role plus ordered parts
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "IncomingChatMessage")]
pub struct ChatMessage {
    pub id: Option<String>,
    pub role: ChatRole,
    pub parts: Vec<MessagePart>,
}

impl From<IncomingChatMessage> for ChatMessage {
    fn from(incoming: IncomingChatMessage) -> Self {
        let mut parts = incoming.parts;
        if parts.is_empty() {
            if let Some(content) = incoming.content.filter(|c| !c.is_empty()) {
                parts.push(MessagePart::Text(content));
            }
        }
        ChatMessage {
            id: incoming.id,
            role: incoming.role,
            parts,
        }
    }
}

impl ChatMessage {
    pub fn user<S: Into<String>>(text: S) -> Self {
        ChatMessage {
            id: None,
            role: ChatRole::User,
            parts: vec![MessagePart::Text(text.into())],
        }
    }

    pub fn assistant<S: Into<String>>(text: S) -> Self {
        ChatMessage {
            id: None,
            role: ChatRole::Assistant,
            parts: vec![MessagePart::Text(text.into())],
        }
    }

    pub fn first_text(&self) -> Option<&str> {
        self.parts.iter().find_map(MessagePart::as_text)
    }

    fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(MessagePart::as_text)
            .collect::<Vec<_>>()
            .join("")
    }
}

/// The first text part of the last user message, empty when there is none
pub fn last_user_query(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .rev()
        .find(|message| message.role == ChatRole::User)
        .and_then(ChatMessage::first_text)
        .unwrap_or_default()
        .to_string()
}

/// Convert the browser history into LLM messages, keeping only user and assistant text
pub fn to_model_messages(messages: &[ChatMessage]) -> Vec<Message> {
    messages
        .iter()
        .filter_map(|message| {
            let text = message.joined_text();
            if text.is_empty() {
                return None;
            }
            match message.role {
                ChatRole::User => Some(Message::user().with_text(text)),
                ChatRole::Assistant => Some(Message::assistant().with_text(text)),
                ChatRole::System | ChatRole::Unknown => {
                    tracing::debug!("Skipping {:?} message in model history", message.role);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::role::Role;
    use serde_json::json;

    #[test]
    fn test_parts_are_classified() {
        let message: ChatMessage = serde_json::from_value(json!({
            "id": "m1",
            "role": "assistant",
            "parts": [
                {"type": "step-start"},
                {"type": "reasoning", "text": "thinking"},
                {"type": "text", "text": "It is 21°C"},
                {"type": "source-url", "sourceId": "s1", "url": "https://example.com"},
                {
                    "type": "tool-getTemperature",
                    "toolCallId": "call_1",
                    "state": "output-available",
                    "input": {"entityId": null},
                    "output": {"temperature": "21.00"}
                },
                {"type": "data-custom", "data": 1}
            ]
        }))
        .unwrap();

        assert_eq!(message.id.as_deref(), Some("m1"));
        assert_eq!(message.role, ChatRole::Assistant);
        assert_eq!(message.parts[0], MessagePart::StepStart);
        assert_eq!(message.parts[1], MessagePart::Reasoning("thinking".into()));
        assert_eq!(message.parts[2], MessagePart::Text("It is 21°C".into()));
        assert!(matches!(
            &message.parts[3],
            MessagePart::SourceUrl { url, .. } if url == "https://example.com"
        ));
        match &message.parts[4] {
            MessagePart::Tool(tool) => {
                assert_eq!(tool.tool_name, "getTemperature");
                assert_eq!(tool.tool_call_id.as_deref(), Some("call_1"));
                assert_eq!(tool.output, Some(json!({"temperature": "21.00"})));
            }
            other => panic!("Expected tool part, got {:?}", other),
        }
        assert!(matches!(message.parts[5], MessagePart::Other(_)));
    }

    #[test]
    fn test_legacy_content_becomes_text_part() {
        let message: ChatMessage =
            serde_json::from_value(json!({"role": "user", "content": "hello"})).unwrap();
        assert_eq!(message.parts, vec![MessagePart::Text("hello".into())]);
    }

    #[test]
    fn test_unknown_role_is_tolerated() {
        let message: ChatMessage =
            serde_json::from_value(json!({"role": "data", "parts": []})).unwrap();
        assert_eq!(message.role, ChatRole::Unknown);
    }

    #[test]
    fn test_last_user_query_takes_first_text_of_last_user_message() {
        let mut last = ChatMessage::user("what's the temperature?");
        last.parts.push(MessagePart::Text("ignored".into()));
        let messages = vec![
            ChatMessage::user("hello"),
            ChatMessage::assistant("hi there"),
            last,
            ChatMessage::assistant("checking"),
        ];
        assert_eq!(last_user_query(&messages), "what's the temperature?");
    }

    #[test]
    fn test_last_user_query_empty_without_user_text() {
        assert_eq!(last_user_query(&[]), "");
        let no_text = ChatMessage {
            id: None,
            role: ChatRole::User,
            parts: vec![MessagePart::StepStart],
        };
        assert_eq!(last_user_query(&[no_text]), "");
    }

    #[test]
    fn test_to_model_messages_keeps_user_and_assistant_text() {
        let system = ChatMessage {
            id: None,
            role: ChatRole::System,
            parts: vec![MessagePart::Text("be nice".into())],
        };
        let tool_only = ChatMessage {
            id: None,
            role: ChatRole::Assistant,
            parts: vec![MessagePart::StepStart],
        };
        let messages = vec![
            system,
            ChatMessage::user("turn on the led"),
            tool_only,
            ChatMessage::assistant("done"),
        ];

        let converted = to_model_messages(&messages);
        assert_eq!(converted.len(), 2);
        assert_eq!(converted[0].role, Role::User);
        assert_eq!(converted[0].text(), "turn on the led");
        assert_eq!(converted[1].role, Role::Assistant);
        assert_eq!(converted[1].text(), "done");
    }
}
