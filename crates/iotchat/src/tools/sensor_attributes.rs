use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

use super::types::{
    iso_from_millis, iso_timestamp, AttributeSummary, SensorAttribute, SensorAttributesParams,
    SensorAttributesReport, ToolName, ToolResult,
};
use super::DeviceTools;
use crate::errors::ToolError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAttribute {
    #[serde(default)]
    last_update_ts: i64,
    key: String,
    #[serde(default)]
    value: Value,
}

impl DeviceTools {
    /// Device attributes, one entry per key
    pub async fn get_sensor_attributes(
        &self,
        params: SensorAttributesParams,
    ) -> ToolResult<SensorAttributesReport> {
        tracing::info!(?params, "Executing getSensorAttributes");
        let outcome = self.fetch_attributes(&params).await;
        Self::finish(ToolName::GetSensorAttributes, &params, outcome)
    }

    async fn fetch_attributes(
        &self,
        params: &SensorAttributesParams,
    ) -> Result<(SensorAttributesReport, Map<String, Value>), ToolError> {
        let entity_id = self.entity_id(params.entity_id.as_deref())?;
        let config = self.client().config();
        let path = format!(
            "/api/plugins/telemetry/{}/{}/values/attributes",
            config.entity_type, entity_id
        );

        let data = self.client().get_json(&path, &[]).await?;
        let raw: Vec<RawAttribute> = serde_json::from_value(data)
            .map_err(|e| ToolError::InvalidResponse(e.to_string()))?;
        let raw_count = raw.len();

        let attributes = latest_per_key(raw.into_iter().map(|item| SensorAttribute {
            timestamp: iso_from_millis(item.last_update_ts),
            last_update_ts: item.last_update_ts,
            key: item.key,
            value: item.value,
        }));
        let summary = summarize(&attributes);
        tracing::info!(raw_count, unique = attributes.len(), "Sensor attributes");

        let report = SensorAttributesReport {
            entity_id: entity_id.clone(),
            attribute_count: attributes.len(),
            message: format!(
                "Retrieved {} sensor attributes successfully",
                attributes.len()
            ),
            timestamp: iso_timestamp(Utc::now()),
            summary,
            attributes,
        };

        let mut extra = Map::new();
        extra.insert("entityId".to_string(), Value::from(entity_id));
        extra.insert("rawAttributeCount".to_string(), Value::from(raw_count));
        extra.insert(
            "uniqueAttributeCount".to_string(),
            Value::from(report.attribute_count),
        );
        Ok((report, extra))
    }
}

/// Keep the newest entry of each key, in order of first appearance
pub fn latest_per_key<I>(attributes: I) -> Vec<SensorAttribute>
where
    I: IntoIterator<Item = SensorAttribute>,
{
    let mut latest: Vec<SensorAttribute> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for attribute in attributes {
        match index.get(&attribute.key) {
            Some(&i) => {
                if attribute.last_update_ts > latest[i].last_update_ts {
                    latest[i] = attribute;
                }
            }
            None => {
                index.insert(attribute.key.clone(), latest.len());
                latest.push(attribute);
            }
        }
    }
    latest
}

pub fn summarize(attributes: &[SensorAttribute]) -> AttributeSummary {
    let mut summary = AttributeSummary::default();
    for attribute in attributes {
        let value = &attribute.value;
        match attribute.key.as_str() {
            "macAddress" => summary.mac_address = value.as_str().map(str::to_string),
            "localIp" => summary.local_ip = value.as_str().map(str::to_string),
            "ssid" => summary.ssid = value.as_str().map(str::to_string),
            "rssi" => summary.rssi = value.as_f64(),
            "ledState" => summary.led_state = value.as_bool(),
            "ledMode" => summary.led_mode = value.as_i64(),
            "active" => summary.active = value.as_bool(),
            _ => {}
        }
    }
    summary
}
