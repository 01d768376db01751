use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Provider name used when neither a preferred nor a fallback spec is configured.
pub const PLACEHOLDER_PROVIDER: &str = "simulated";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferredProvider {
    #[default]
    Auto,
    Local,
    Cloud,
}

impl FromStr for PreferredProvider {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "local" => Ok(Self::Local),
            "cloud" => Ok(Self::Cloud),
            other => Err(format!("unsupported preferred provider `{other}` (expected auto|local|cloud)")),
        }
    }
}

impl fmt::Display for PreferredProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Local => "local",
            Self::Cloud => "cloud",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Local,
    Cloud,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "cloud" => Ok(Self::Cloud),
            other => Err(format!("unsupported provider kind `{other}` (expected local|cloud)")),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Cloud => "cloud",
        })
    }
}

/// One inference backend and its tuning parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub provider: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl ProviderSpec {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            endpoint: None,
            model: None,
            region: None,
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn placeholder() -> Self {
        Self::new(PLACEHOLDER_PROVIDER)
    }

    pub fn is_placeholder(&self) -> bool {
        self.provider == PLACEHOLDER_PROVIDER && self.endpoint.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingPolicy {
    #[serde(default)]
    pub preferred_provider: PreferredProvider,
    #[serde(default)]
    pub fallback_provider: Option<ProviderKind>,
    #[serde(default)]
    pub cost_threshold: Option<Decimal>,
    #[serde(default)]
    pub latency_threshold_ms: Option<u64>,
    #[serde(default)]
    pub cloud_provider: Option<ProviderSpec>,
    #[serde(default)]
    pub local_provider: Option<ProviderSpec>,
}

impl RoutingPolicy {
    pub fn spec_for(&self, kind: ProviderKind) -> Option<&ProviderSpec> {
        match kind {
            ProviderKind::Local => self.local_provider.as_ref(),
            ProviderKind::Cloud => self.cloud_provider.as_ref(),
        }
    }
}
