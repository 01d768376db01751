use std::sync::Arc;

use harvest_agent::NlpRouter;
use harvest_core::config::{AppConfig, ConfigError, LoadOptions};
use harvest_providers::{LocalProviderManager, ProviderError};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub router: Arc<NlpRouter>,
    pub providers: Arc<LocalProviderManager>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("local provider manager setup failed: {0}")]
    Providers(#[from] ProviderError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let policy = config.routing_policy();
    info!(
        event_name = "system.bootstrap.policy_loaded",
        correlation_id = "bootstrap",
        preferred_provider = %policy.preferred_provider,
        local_provider = policy.local_provider.as_ref().map(|spec| spec.provider.as_str()).unwrap_or("disabled"),
        cloud_provider = policy.cloud_provider.as_ref().map(|spec| spec.provider.as_str()).unwrap_or("disabled"),
        "routing policy loaded"
    );
    let router = Arc::new(NlpRouter::new(policy));
    let providers = Arc::new(LocalProviderManager::from_config(&config.probe)?);

    Ok(Application { config, router, providers })
}

#[cfg(test)]
mod tests {
    use harvest_core::config::{ConfigOverrides, LoadOptions};
    use harvest_core::domain::provider::PreferredProvider;

    use crate::bootstrap::bootstrap;

    #[tokio::test]
    async fn bootstrap_fails_fast_on_invalid_overrides() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                local_endpoint: Some("localhost:11434".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().map(|error| error.to_string()).unwrap_or_default();
        assert!(message.contains("local_provider.endpoint"), "unexpected error: {message}");
    }

    #[tokio::test]
    async fn bootstrap_wires_router_with_configured_policy() {
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                preferred_provider: Some(PreferredProvider::Local),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap should succeed with valid overrides");

        assert_eq!(app.router.policy().preferred_provider, PreferredProvider::Local);
        assert_eq!(
            app.router.policy().local_provider.as_ref().map(|spec| spec.provider.as_str()),
            Some("ollama")
        );
        assert_eq!(app.providers.known_providers(), vec!["ollama", "lmstudio"]);
    }
}
