use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use strum_macros::{Display, EnumIter};

/// Tool names as they appear in `tool-<name>` UI parts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum ToolName {
    #[strum(serialize = "getTemperature")]
    GetTemperature,
    #[strum(serialize = "controlLED")]
    ControlLed,
    #[strum(serialize = "getSensorAttributes")]
    GetSensorAttributes,
}

impl ToolName {
    /// Prefix used when tagging errors raised by the tool
    pub fn label(&self) -> &'static str {
        match self {
            ToolName::GetTemperature => "TemperatureTool",
            ToolName::ControlLed => "LedControlTool",
            ToolName::GetSensorAttributes => "SensorAttributesTool",
        }
    }
}

/// Outcome of a single tool call, failures are folded in as a tagged string
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub metadata: Map<String, Value>,
}

impl<T> ToolResult<T> {
    pub fn ok(data: T, metadata: Map<String, Value>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata,
        }
    }

    pub fn err<S: Into<String>>(error: S, metadata: Map<String, Value>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            metadata,
        }
    }

    /// The payload, or the error string when the call failed
    pub fn into_result(self) -> Result<T, String> {
        match self.data {
            Some(data) if self.success => Ok(data),
            _ => Err(self.error.unwrap_or_else(|| "Unknown error".to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureParams {
    pub entity_id: Option<String>,
    pub keys: Option<String>,
    pub use_strict_data_types: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedControlParams {
    pub entity_id: Option<String>,
    pub led_state: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorAttributesParams {
    pub entity_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorValue {
    pub value: Value,
    pub timestamp: String,
    pub raw_timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureReading {
    /// Two decimals, or "No data"
    pub temperature: String,
    pub unit: String,
    pub source: String,
    pub sensor_id: String,
    pub message: String,
    pub timestamp: String,
    pub all_sensor_data: BTreeMap<String, SensorValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedControlOutcome {
    pub success: bool,
    pub led_state: bool,
    pub entity_id: String,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorAttribute {
    pub last_update_ts: i64,
    pub key: String,
    pub value: Value,
    pub timestamp: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rssi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub led_state: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub led_mode: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorAttributesReport {
    pub entity_id: String,
    pub attributes: Vec<SensorAttribute>,
    pub attribute_count: usize,
    pub message: String,
    pub timestamp: String,
    pub summary: AttributeSummary,
}

/// Payload of any device tool, serialized as the bare payload for the UI widgets
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolData {
    Temperature(TemperatureReading),
    Led(LedControlOutcome),
    Attributes(SensorAttributesReport),
}

impl ToolData {
    pub fn tool_name(&self) -> ToolName {
        match self {
            ToolData::Temperature(_) => ToolName::GetTemperature,
            ToolData::Led(_) => ToolName::ControlLed,
            ToolData::Attributes(_) => ToolName::GetSensorAttributes,
        }
    }
}

/// ISO-8601 with millisecond precision and a `Z` suffix
pub fn iso_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn iso_from_millis(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(iso_timestamp)
        .unwrap_or_default()
}
