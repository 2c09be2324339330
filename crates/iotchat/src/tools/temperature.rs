use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::types::{
    iso_from_millis, iso_timestamp, SensorValue, TemperatureParams, TemperatureReading, ToolName,
    ToolResult,
};
use super::DeviceTools;
use crate::errors::ToolError;

const UNIT: &str = "°C";

impl DeviceTools {
    /// Latest temperature telemetry of a device
    pub async fn get_temperature(
        &self,
        params: TemperatureParams,
    ) -> ToolResult<TemperatureReading> {
        tracing::info!(?params, "Executing getTemperature");
        let outcome = self.fetch_temperature(&params).await;
        Self::finish(ToolName::GetTemperature, &params, outcome)
    }

    async fn fetch_temperature(
        &self,
        params: &TemperatureParams,
    ) -> Result<(TemperatureReading, Map<String, Value>), ToolError> {
        let entity_id = self.entity_id(params.entity_id.as_deref())?;
        let config = self.client().config();
        let path = format!(
            "/api/plugins/telemetry/{}/{}/values/timeseries",
            config.entity_type, entity_id
        );

        let mut query = vec![(
            "useStrictDataTypes",
            params.use_strict_data_types.unwrap_or(false).to_string(),
        )];
        if let Some(keys) = params.keys.as_deref().filter(|k| !k.is_empty()) {
            query.push(("keys", keys.to_string()));
        }

        let data = self.client().get_json(&path, &query).await?;
        let series = data.as_object().ok_or_else(|| {
            ToolError::InvalidResponse("expected an object of telemetry series".to_string())
        })?;

        let reading = reading_from_timeseries(series, &entity_id);
        tracing::info!(
            source = %reading.source,
            temperature = %reading.temperature,
            "Temperature reading"
        );

        let mut extra = Map::new();
        extra.insert("entityId".to_string(), Value::from(entity_id));
        extra.insert(
            "dataKeysFound".to_string(),
            Value::from(series.keys().cloned().collect::<Vec<_>>()),
        );
        extra.insert(
            "sensorDataCount".to_string(),
            Value::from(reading.all_sensor_data.len()),
        );
        Ok((reading, extra))
    }
}

struct Sample {
    source: String,
    value: f64,
    raw_timestamp: i64,
}

fn latest_entry(values: &Value) -> Option<&Value> {
    values.as_array().and_then(|entries| entries.first())
}

fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn sample(key: &str, values: &Value) -> Option<Sample> {
    let entry = latest_entry(values)?;
    Some(Sample {
        source: key.to_string(),
        value: parse_number(entry.get("value")?)?,
        raw_timestamp: entry.get("ts").and_then(Value::as_i64).unwrap_or_default(),
    })
}

/// Pick the temperature out of a `key -> [{ts, value}]` telemetry response
pub fn reading_from_timeseries(series: &Map<String, Value>, sensor_id: &str) -> TemperatureReading {
    let mut all_sensor_data = BTreeMap::new();
    for (key, values) in series {
        if let Some(entry) = latest_entry(values) {
            let raw_timestamp = entry.get("ts").and_then(Value::as_i64).unwrap_or_default();
            all_sensor_data.insert(
                key.clone(),
                SensorValue {
                    value: entry.get("value").cloned().unwrap_or(Value::Null),
                    timestamp: iso_from_millis(raw_timestamp),
                    raw_timestamp,
                },
            );
        }
    }

    let found = series
        .get("temperature")
        .and_then(|values| sample("temperature", values))
        .or_else(|| {
            series
                .iter()
                .filter(|(key, _)| {
                    key.as_str() != "temperature" && key.to_lowercase().contains("temp")
                })
                .find_map(|(key, values)| sample(key, values))
        });

    match found {
        Some(sample) => {
            let timestamp = iso_from_millis(sample.raw_timestamp);
            let temperature = format!("{:.2}", sample.value);
            TemperatureReading {
                message: format!(
                    "Latest temperature: {}{} from {} at {}",
                    temperature, UNIT, sample.source, timestamp
                ),
                temperature,
                unit: UNIT.to_string(),
                source: sample.source,
                sensor_id: sensor_id.to_string(),
                timestamp,
                all_sensor_data,
            }
        }
        None => TemperatureReading {
            temperature: "No data".to_string(),
            unit: UNIT.to_string(),
            source: "none".to_string(),
            sensor_id: sensor_id.to_string(),
            message: "No temperature data found in response".to_string(),
            timestamp: iso_timestamp(Utc::now()),
            all_sensor_data,
        },
    }
}
