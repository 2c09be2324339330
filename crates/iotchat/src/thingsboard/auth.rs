use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::config::ThingsBoardConfig;
use super::ThingsBoardError;

/// ThingsBoard JWTs live for an hour, refresh five minutes early
pub const TOKEN_TTL: Duration = Duration::from_secs(55 * 60);

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    #[serde(default)]
    token: Option<String>,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Process-wide token cache in front of `/api/auth/login`
pub struct ThingsBoardAuth {
    client: Client,
    config: ThingsBoardConfig,
    token_ttl: Duration,
    // Held across the login call, so concurrent refreshes collapse into one
    cached: Mutex<Option<CachedToken>>,
}

impl ThingsBoardAuth {
    pub fn new(client: Client, config: ThingsBoardConfig) -> Self {
        Self::with_token_ttl(client, config, TOKEN_TTL)
    }

    pub fn with_token_ttl(client: Client, config: ThingsBoardConfig, token_ttl: Duration) -> Self {
        Self {
            client,
            config,
            token_ttl,
            cached: Mutex::new(None),
        }
    }

    /// Get a valid access token, logging in again when the cached one expired
    pub async fn access_token(&self) -> Result<String, ThingsBoardError> {
        let mut cached = self.cached.lock().await;

        if let Some(entry) = cached.as_ref() {
            if Instant::now() < entry.expires_at {
                tracing::debug!("Using cached ThingsBoard token");
                return Ok(entry.token.clone());
            }
        }

        if let Some(token) = self.config.access_token.as_deref() {
            if !is_token_expired(token) {
                tracing::debug!("Using configured ThingsBoard token");
                return Ok(token.to_string());
            }
        }

        tracing::info!("Generating new ThingsBoard token");
        let token = self.login().await?;
        *cached = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + self.token_ttl,
        });
        Ok(token)
    }

    /// Force a login on the next `access_token` call
    pub async fn clear_token(&self) {
        *self.cached.lock().await = None;
        tracing::info!("ThingsBoard token cache cleared");
    }

    async fn login(&self) -> Result<String, ThingsBoardError> {
        let response = self
            .client
            .post(self.config.endpoint("/api/auth/login"))
            .header("accept", "application/json")
            .json(&LoginRequest {
                username: &self.config.username,
                password: &self.config.password,
            })
            .send()
            .await
            .map_err(|e| ThingsBoardError::Auth(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "ThingsBoard login failed");
            return Err(ThingsBoardError::Auth(format!(
                "Authentication failed: {}. {}",
                status, body
            )));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| ThingsBoardError::Auth(e.to_string()))?;

        match login.token.filter(|token| !token.is_empty()) {
            Some(token) => {
                tracing::info!("New ThingsBoard token generated");
                Ok(token)
            }
            None => Err(ThingsBoardError::Auth(
                "No access token received from ThingsBoard".to_string(),
            )),
        }
    }
}

/// Basic JWT `exp` check, anything we cannot read counts as expired
pub fn is_token_expired(token: &str) -> bool {
    let Some(payload) = token.split('.').nth(1) else {
        return true;
    };
    let Ok(bytes) =
        base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))
    else {
        tracing::warn!("Could not decode ThingsBoard token, assuming expired");
        return true;
    };
    let exp = serde_json::from_slice::<Value>(&bytes)
        .ok()
        .and_then(|claims| claims.get("exp").and_then(Value::as_i64));

    match exp {
        Some(exp) => exp < chrono::Utc::now().timestamp(),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) fn jwt_with_exp(exp: i64) -> String {
        let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        let header = engine.encode(r#"{"alg":"HS512"}"#);
        let claims = engine.encode(json!({"sub": "tenant@example.com", "exp": exp}).to_string());
        format!("{}.{}.signature", header, claims)
    }

    async fn mount_login(server: &MockServer, token: &str, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(body_json(json!({"username": "tenant", "password": "secret"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"token": token, "refreshToken": "refresh"})),
            )
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    fn config(server: &MockServer) -> ThingsBoardConfig {
        ThingsBoardConfig::new("tenant", "secret").with_url(server.uri())
    }

    #[tokio::test]
    async fn test_token_is_cached_within_ttl() {
        let server = MockServer::start().await;
        mount_login(&server, "jwt-1", 1).await;

        let auth = ThingsBoardAuth::new(Client::new(), config(&server));
        assert_eq!(auth.access_token().await.unwrap(), "jwt-1");
        assert_eq!(auth.access_token().await.unwrap(), "jwt-1");
    }

    #[tokio::test]
    async fn test_expired_cache_logs_in_again() {
        let server = MockServer::start().await;
        mount_login(&server, "jwt-1", 2).await;

        let auth = ThingsBoardAuth::with_token_ttl(Client::new(), config(&server), Duration::ZERO);
        auth.access_token().await.unwrap();
        auth.access_token().await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_token_forces_login() {
        let server = MockServer::start().await;
        mount_login(&server, "jwt-1", 2).await;

        let auth = ThingsBoardAuth::new(Client::new(), config(&server));
        auth.access_token().await.unwrap();
        auth.clear_token().await;
        auth.access_token().await.unwrap();
    }

    #[tokio::test]
    async fn test_valid_configured_token_skips_login() {
        let server = MockServer::start().await;
        mount_login(&server, "jwt-login", 0).await;

        let preset = jwt_with_exp(chrono::Utc::now().timestamp() + 3600);
        let mut config = config(&server);
        config.access_token = Some(preset.clone());

        let auth = ThingsBoardAuth::new(Client::new(), config);
        assert_eq!(auth.access_token().await.unwrap(), preset);
    }

    #[tokio::test]
    async fn test_expired_configured_token_falls_back_to_login() {
        let server = MockServer::start().await;
        mount_login(&server, "jwt-login", 1).await;

        let mut config = config(&server);
        config.access_token = Some(jwt_with_exp(chrono::Utc::now().timestamp() - 60));

        let auth = ThingsBoardAuth::new(Client::new(), config);
        assert_eq!(auth.access_token().await.unwrap(), "jwt-login");
    }

    #[tokio::test]
    async fn test_login_failure_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .mount(&server)
            .await;

        let auth = ThingsBoardAuth::new(Client::new(), config(&server));
        let err = auth.access_token().await.unwrap_err();
        assert!(matches!(err, ThingsBoardError::Auth(_)));
        assert!(err.to_string().contains("bad credentials"));
    }

    #[tokio::test]
    async fn test_missing_token_in_response_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let auth = ThingsBoardAuth::new(Client::new(), config(&server));
        let err = auth.access_token().await.unwrap_err();
        assert!(err.to_string().contains("No access token received"));
    }

    #[test]
    fn test_is_token_expired() {
        assert!(is_token_expired("not-a-jwt"));
        assert!(is_token_expired("a.!!!.c"));
        assert!(is_token_expired(&jwt_with_exp(0)));
        assert!(!is_token_expired(&jwt_with_exp(
            chrono::Utc::now().timestamp() + 60
        )));
    }
}
