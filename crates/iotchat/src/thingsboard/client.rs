use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;

use super::auth::ThingsBoardAuth;
use super::config::ThingsBoardConfig;
use super::ThingsBoardError;

/// Authenticated ThingsBoard REST client shared by all requests
pub struct ThingsBoardClient {
    client: Client,
    config: ThingsBoardConfig,
    auth: ThingsBoardAuth,
}

impl ThingsBoardClient {
    /// Uses reqwest's default client, so no request timeout is imposed
    pub fn new(config: ThingsBoardConfig) -> Self {
        let client = Client::new();
        let auth = ThingsBoardAuth::new(client.clone(), config.clone());
        Self::with_auth(client, config, auth)
    }

    pub fn with_auth(client: Client, config: ThingsBoardConfig, auth: ThingsBoardAuth) -> Self {
        Self {
            client,
            config,
            auth,
        }
    }

    pub fn config(&self) -> &ThingsBoardConfig {
        &self.config
    }

    pub fn auth(&self) -> &ThingsBoardAuth {
        &self.auth
    }

    /// GET a JSON document from `path` with optional query parameters
    pub async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, ThingsBoardError> {
        let url = self.config.endpoint(path);
        tracing::info!(%url, "ThingsBoard GET");

        let request = self.client.get(&url).query(query);
        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|e| ThingsBoardError::Decode(e.to_string()))
    }

    /// POST a JSON body to `path`, an empty or non-JSON reply yields `None`
    pub async fn post_json(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<Option<Value>, ThingsBoardError> {
        let url = self.config.endpoint(path);
        tracing::info!(%url, %body, "ThingsBoard POST");

        let request = self.client.post(&url).json(body);
        let response = self.send(request).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(serde_json::from_str(&text).ok())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ThingsBoardError> {
        let token = self.auth.access_token().await?;
        let response = request
            .header("accept", "application/json")
            .header("X-Authorization", format!("Bearer {}", token))
            .send()
            .await?;

        let status = response.status();
        tracing::info!(%status, "ThingsBoard response");
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            // The next call logs in again, this one still fails
            self.auth.clear_token().await;
        }
        let body = response.text().await.unwrap_or_default();
        tracing::error!(%status, %body, "ThingsBoard API error");
        Err(ThingsBoardError::Api { status, body })
    }
}
