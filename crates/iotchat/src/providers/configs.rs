// Unified enum to wrap different provider configurations
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    OpenAi(OpenAiProviderConfig),
    Ollama(OllamaProviderConfig),
}

impl ProviderConfig {
    pub fn model(&self) -> &str {
        match self {
            ProviderConfig::OpenAi(config) => &config.model,
            ProviderConfig::Ollama(config) => &config.model,
        }
    }

    /// The same configuration pointed at a different model
    pub fn with_model<S: Into<String>>(self, model: S) -> Self {
        match self {
            ProviderConfig::OpenAi(config) => ProviderConfig::OpenAi(OpenAiProviderConfig {
                model: model.into(),
                ..config
            }),
            ProviderConfig::Ollama(config) => ProviderConfig::Ollama(OllamaProviderConfig {
                model: model.into(),
                ..config
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct OllamaProviderConfig {
    pub host: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}
