use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment};
use iotchat::providers::{
    configs::{OllamaProviderConfig, OpenAiProviderConfig, ProviderConfig},
    factory::ProviderType,
    ollama, openai,
};
use iotchat::thingsboard::config::{THINGSBOARD_ENTITY_TYPE, THINGSBOARD_URL};
use iotchat::thingsboard::ThingsBoardConfig;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::net::{AddrParseError, SocketAddr};

#[derive(Debug, Default, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ProviderSettings {
    OpenAi {
        #[serde(default = "default_openai_host")]
        host: String,
        api_key: String,
        #[serde(default = "default_model")]
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<i32>,
    },
    Ollama {
        #[serde(default = "default_ollama_host")]
        host: String,
        #[serde(default = "default_ollama_model")]
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<i32>,
    },
}

impl ProviderSettings {
    pub fn provider_type(&self) -> ProviderType {
        match self {
            ProviderSettings::OpenAi { .. } => ProviderType::OpenAi,
            ProviderSettings::Ollama { .. } => ProviderType::Ollama,
        }
    }

    pub fn into_config(self) -> ProviderConfig {
        match self {
            ProviderSettings::OpenAi {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            } => ProviderConfig::OpenAi(OpenAiProviderConfig {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            }),
            ProviderSettings::Ollama {
                host,
                model,
                temperature,
                max_tokens,
            } => ProviderConfig::Ollama(OllamaProviderConfig {
                host,
                model,
                temperature,
                max_tokens,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ThingsBoardSettings {
    #[serde(default = "default_thingsboard_url")]
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub default_entity_id: String,
    #[serde(default = "default_entity_type")]
    pub entity_type: String,
    #[serde(default)]
    pub access_token: Option<String>,
}

impl ThingsBoardSettings {
    pub fn into_config(self) -> ThingsBoardConfig {
        let mut config = ThingsBoardConfig::new(self.username, self.password)
            .with_url(self.url)
            .with_default_entity_id(self.default_entity_id);
        config.entity_type = self.entity_type;
        config.access_token = self.access_token.filter(|token| !token.is_empty());
        config
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    pub thingsboard: ThingsBoardSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("thingsboard.url", default_thingsboard_url())?
            .set_default("thingsboard.entity_type", default_entity_type())?
            .add_source(
                Environment::with_prefix("IOTCHAT")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        // Per section, so a missing field can be named with its full path
        Ok(Self {
            server: section(&config, "server", "host")?,
            provider: section(&config, "provider", "type")?,
            thingsboard: section(&config, "thingsboard", "username")?,
        })
    }
}

fn section<T: DeserializeOwned>(
    config: &Config,
    key: &str,
    first_required: &str,
) -> Result<T, ConfigError> {
    config.get::<T>(key).map_err(|err| {
        tracing::debug!("Configuration error: {:?}", &err);
        if let config::ConfigError::NotFound(_) = &err {
            return ConfigError::MissingEnvVar {
                env_var: to_env_var(&format!("{}.{}", key, first_required)),
            };
        }
        match missing_field(&err.to_string()) {
            Some(field) => ConfigError::MissingEnvVar {
                env_var: to_env_var(&format!("{}.{}", key, field)),
            },
            None => ConfigError::Other(err),
        }
    })
}

/// Field name from a serde "missing field `name`" message
fn missing_field(message: &str) -> Option<&str> {
    const MARKER: &str = "missing field `";
    let start = message.find(MARKER)? + MARKER.len();
    message[start..].split('`').next().filter(|f| !f.is_empty())
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_model() -> String {
    openai::OPENAI_MODEL.to_string()
}

fn default_openai_host() -> String {
    openai::OPENAI_HOST.to_string()
}

fn default_ollama_host() -> String {
    ollama::OLLAMA_HOST.to_string()
}

fn default_ollama_model() -> String {
    ollama::OLLAMA_MODEL.to_string()
}

fn default_thingsboard_url() -> String {
    THINGSBOARD_URL.to_string()
}

fn default_entity_type() -> String {
    THINGSBOARD_ENTITY_TYPE.to_string()
}
