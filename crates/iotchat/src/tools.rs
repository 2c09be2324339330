//! Device tools: one ThingsBoard REST call each, with failures folded into a
//! [`ToolResult`] instead of propagated.
pub mod led_control;
pub mod sensor_attributes;
pub mod temperature;
pub mod types;

pub use types::{
    LedControlOutcome, LedControlParams, SensorAttributesParams, SensorAttributesReport,
    TemperatureParams, TemperatureReading, ToolData, ToolName, ToolResult,
};

use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::errors::ToolError;
use crate::thingsboard::ThingsBoardClient;

#[derive(Clone)]
pub struct DeviceTools {
    client: Arc<ThingsBoardClient>,
}

impl DeviceTools {
    pub fn new(client: Arc<ThingsBoardClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ThingsBoardClient {
        &self.client
    }

    fn entity_id(&self, explicit: Option<&str>) -> Result<String, ToolError> {
        self.client
            .config()
            .resolve_entity_id(explicit)
            .ok_or(ToolError::MissingEntityId)
    }

    /// Wrap a tool outcome with its metadata, extras are only kept on success
    fn finish<T, P: Serialize>(
        name: ToolName,
        params: &P,
        outcome: Result<(T, Map<String, Value>), ToolError>,
    ) -> ToolResult<T> {
        let mut metadata = Map::new();
        metadata.insert("toolName".to_string(), Value::from(name.to_string()));
        metadata.insert(
            "executedAt".to_string(),
            Value::from(types::iso_timestamp(chrono::Utc::now())),
        );
        metadata.insert(
            "originalParams".to_string(),
            serde_json::to_value(params).unwrap_or(Value::Null),
        );

        match outcome {
            Ok((data, extra)) => {
                metadata.extend(extra);
                ToolResult::ok(data, metadata)
            }
            Err(e) => {
                tracing::error!(tool = %name, error = %e, "Tool call failed");
                ToolResult::err(format!("{} error: {}", name.label(), e), metadata)
            }
        }
    }
}
