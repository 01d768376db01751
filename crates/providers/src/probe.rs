use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use harvest_core::config::ProbeConfig;

use crate::error::ProviderError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub body: String,
}

impl ProbeResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Lightweight GET used for liveness checks and model listings.
#[async_trait]
pub trait ServiceProbe: Send + Sync {
    async fn get(&self, url: &str) -> Result<ProbeResponse, ProviderError>;
}

#[derive(Clone, Debug)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ProviderError::Client(error.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_config(config: &ProbeConfig) -> Result<Self, ProviderError> {
        Self::new(Duration::from_millis(config.timeout_ms))
    }
}

#[async_trait]
impl ServiceProbe for HttpProbe {
    async fn get(&self, url: &str) -> Result<ProbeResponse, ProviderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|error| ProviderError::Probe { url: url.to_string(), reason: error.to_string() })?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|error| ProviderError::Probe { url: url.to_string(), reason: error.to_string() })?;
        debug!(event_name = "providers.probe.completed", url, status, "probe completed");
        Ok(ProbeResponse { status, body })
    }
}
