use chrono::Utc;
use serde_json::{json, Map, Value};

use super::types::{iso_timestamp, LedControlOutcome, LedControlParams, ToolName, ToolResult};
use super::DeviceTools;
use crate::errors::ToolError;

impl DeviceTools {
    /// Write the `ledState` shared attribute of a device
    pub async fn control_led(&self, params: LedControlParams) -> ToolResult<LedControlOutcome> {
        tracing::info!(?params, "Executing controlLED");
        let outcome = self.set_led_state(&params).await;
        Self::finish(ToolName::ControlLed, &params, outcome)
    }

    async fn set_led_state(
        &self,
        params: &LedControlParams,
    ) -> Result<(LedControlOutcome, Map<String, Value>), ToolError> {
        let entity_id = self.entity_id(params.entity_id.as_deref())?;
        let path = format!("/api/plugins/telemetry/{}/SHARED_SCOPE", entity_id);

        let reply = self
            .client()
            .post_json(&path, &json!({ "ledState": params.led_state }))
            .await?;
        tracing::debug!(?reply, "LED control reply");

        let outcome = LedControlOutcome {
            success: true,
            led_state: params.led_state,
            entity_id: entity_id.clone(),
            message: format!(
                "LED successfully turned {}",
                if params.led_state { "ON" } else { "OFF" }
            ),
            timestamp: iso_timestamp(Utc::now()),
        };

        let mut extra = Map::new();
        extra.insert("entityId".to_string(), Value::from(entity_id));
        extra.insert(
            "action".to_string(),
            Value::from(if params.led_state { "turn_on" } else { "turn_off" }),
        );
        Ok((outcome, extra))
    }
}
