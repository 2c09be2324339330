use iotchat::providers::base::Provider;
use iotchat::providers::configs::ProviderConfig;
use iotchat::providers::factory;
use iotchat::thingsboard::{ThingsBoardClient, ThingsBoardConfig};
use iotchat::tools::DeviceTools;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub provider_config: ProviderConfig,
    /// Built once so requests on the configured model share one connection pool
    provider: Arc<dyn Provider>,
    /// Holds the process-wide ThingsBoard token cache
    pub tools: DeviceTools,
}

fn build_provider(config: ProviderConfig) -> anyhow::Result<Arc<dyn Provider>> {
    tracing::debug!(model = config.model(), "Creating provider");
    let provider: Arc<dyn Provider + Send + Sync> = Arc::from(factory::get_provider(config)?);
    Ok(provider)
}

impl AppState {
    pub fn new(
        provider_config: ProviderConfig,
        thingsboard: ThingsBoardConfig,
    ) -> anyhow::Result<Self> {
        let provider = build_provider(provider_config.clone())?;
        let client = ThingsBoardClient::new(thingsboard);
        Ok(Self {
            provider_config,
            provider,
            tools: DeviceTools::new(Arc::new(client)),
        })
    }

    /// The shared provider, or a fresh one when a request picks another model
    pub fn provider_for(&self, model: Option<&str>) -> anyhow::Result<Arc<dyn Provider>> {
        match model.map(str::trim).filter(|m| !m.is_empty()) {
            Some(model) if model != self.provider_config.model() => {
                build_provider(self.provider_config.clone().with_model(model))
            }
            _ => Ok(self.provider.clone()),
        }
    }
}
