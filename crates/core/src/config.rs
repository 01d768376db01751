use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::provider::{PreferredProvider, ProviderKind, ProviderSpec, RoutingPolicy};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub routing: RoutingConfig,
    pub local_provider: LocalProviderConfig,
    pub cloud_provider: CloudProviderConfig,
    pub probe: ProbeConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct RoutingConfig {
    pub preferred_provider: PreferredProvider,
    pub fallback_provider: Option<ProviderKind>,
    pub cost_threshold: Option<Decimal>,
    pub latency_threshold_ms: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct LocalProviderConfig {
    pub enabled: bool,
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Clone, Debug)]
pub struct CloudProviderConfig {
    pub enabled: bool,
    pub provider: String,
    pub endpoint: Option<String>,
    pub model: String,
    pub region: Option<String>,
    pub api_key: Option<SecretString>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Clone, Debug)]
pub struct ProbeConfig {
    pub timeout_ms: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub preferred_provider: Option<PreferredProvider>,
    pub local_endpoint: Option<String>,
    pub local_model: Option<String>,
    pub cloud_api_key: Option<String>,
    pub server_port: Option<u16>,
    pub probe_timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            routing: RoutingConfig {
                preferred_provider: PreferredProvider::Auto,
                fallback_provider: None,
                cost_threshold: None,
                latency_threshold_ms: None,
            },
            local_provider: LocalProviderConfig {
                enabled: true,
                provider: "ollama".to_string(),
                endpoint: "http://localhost:11434".to_string(),
                model: "llama3.1:8b".to_string(),
                max_tokens: 2048,
                temperature: 0.7,
            },
            cloud_provider: CloudProviderConfig {
                enabled: false,
                provider: "openai".to_string(),
                endpoint: None,
                model: "gpt-4o-mini".to_string(),
                region: None,
                api_key: None,
                max_tokens: 1024,
                temperature: 0.7,
            },
            probe: ProbeConfig { timeout_ms: 2_000 },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("harvest.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Routing policy derived from the enabled provider sections.
    pub fn routing_policy(&self) -> RoutingPolicy {
        let local_provider = self.local_provider.enabled.then(|| {
            ProviderSpec::new(self.local_provider.provider.clone())
                .with_endpoint(self.local_provider.endpoint.clone())
                .with_model(self.local_provider.model.clone())
                .with_max_tokens(self.local_provider.max_tokens)
                .with_temperature(self.local_provider.temperature)
        });

        let cloud_provider = self.cloud_provider.enabled.then(|| {
            let mut spec = ProviderSpec::new(self.cloud_provider.provider.clone())
                .with_model(self.cloud_provider.model.clone())
                .with_max_tokens(self.cloud_provider.max_tokens)
                .with_temperature(self.cloud_provider.temperature);
            spec.endpoint = self.cloud_provider.endpoint.clone();
            spec.region = self.cloud_provider.region.clone();
            spec
        });

        RoutingPolicy {
            preferred_provider: self.routing.preferred_provider,
            fallback_provider: self.routing.fallback_provider,
            cost_threshold: self.routing.cost_threshold,
            latency_threshold_ms: self.routing.latency_threshold_ms,
            cloud_provider,
            local_provider,
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(routing) = patch.routing {
            if let Some(preferred_provider) = routing.preferred_provider {
                self.routing.preferred_provider = preferred_provider;
            }
            if let Some(fallback_provider) = routing.fallback_provider {
                self.routing.fallback_provider = Some(fallback_provider);
            }
            if let Some(cost_threshold) = routing.cost_threshold {
                self.routing.cost_threshold = Some(cost_threshold);
            }
            if let Some(latency_threshold_ms) = routing.latency_threshold_ms {
                self.routing.latency_threshold_ms = Some(latency_threshold_ms);
            }
        }

        if let Some(local) = patch.local_provider {
            if let Some(enabled) = local.enabled {
                self.local_provider.enabled = enabled;
            }
            if let Some(provider) = local.provider {
                self.local_provider.provider = provider;
            }
            if let Some(endpoint) = local.endpoint {
                self.local_provider.endpoint = endpoint;
            }
            if let Some(model) = local.model {
                self.local_provider.model = model;
            }
            if let Some(max_tokens) = local.max_tokens {
                self.local_provider.max_tokens = max_tokens;
            }
            if let Some(temperature) = local.temperature {
                self.local_provider.temperature = temperature;
            }
        }

        if let Some(cloud) = patch.cloud_provider {
            if let Some(enabled) = cloud.enabled {
                self.cloud_provider.enabled = enabled;
            }
            if let Some(provider) = cloud.provider {
                self.cloud_provider.provider = provider;
            }
            if let Some(endpoint) = cloud.endpoint {
                self.cloud_provider.endpoint = Some(endpoint);
            }
            if let Some(model) = cloud.model {
                self.cloud_provider.model = model;
            }
            if let Some(region) = cloud.region {
                self.cloud_provider.region = Some(region);
            }
            if let Some(cloud_api_key_value) = cloud.api_key {
                self.cloud_provider.api_key = Some(secret_value(cloud_api_key_value));
            }
            if let Some(max_tokens) = cloud.max_tokens {
                self.cloud_provider.max_tokens = max_tokens;
            }
            if let Some(temperature) = cloud.temperature {
                self.cloud_provider.temperature = temperature;
            }
        }

        if let Some(probe) = patch.probe {
            if let Some(timeout_ms) = probe.timeout_ms {
                self.probe.timeout_ms = timeout_ms;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("HARVEST_ROUTING_PREFERRED_PROVIDER") {
            self.routing.preferred_provider =
                parse_with("HARVEST_ROUTING_PREFERRED_PROVIDER", &value)?;
        }
        if let Some(value) = read_env("HARVEST_ROUTING_FALLBACK_PROVIDER") {
            self.routing.fallback_provider =
                Some(parse_with("HARVEST_ROUTING_FALLBACK_PROVIDER", &value)?);
        }
        if let Some(value) = read_env("HARVEST_ROUTING_COST_THRESHOLD") {
            self.routing.cost_threshold = Some(parse_with("HARVEST_ROUTING_COST_THRESHOLD", &value)?);
        }
        if let Some(value) = read_env("HARVEST_ROUTING_LATENCY_THRESHOLD_MS") {
            self.routing.latency_threshold_ms =
                Some(parse_with("HARVEST_ROUTING_LATENCY_THRESHOLD_MS", &value)?);
        }

        if let Some(value) = read_env("HARVEST_LOCAL_PROVIDER_ENABLED") {
            self.local_provider.enabled = parse_with("HARVEST_LOCAL_PROVIDER_ENABLED", &value)?;
        }
        if let Some(value) = read_env("HARVEST_LOCAL_PROVIDER_PROVIDER") {
            self.local_provider.provider = value;
        }
        if let Some(value) = read_env("HARVEST_LOCAL_PROVIDER_ENDPOINT") {
            self.local_provider.endpoint = value;
        }
        if let Some(value) = read_env("HARVEST_LOCAL_PROVIDER_MODEL") {
            self.local_provider.model = value;
        }
        if let Some(value) = read_env("HARVEST_LOCAL_PROVIDER_MAX_TOKENS") {
            self.local_provider.max_tokens =
                parse_with("HARVEST_LOCAL_PROVIDER_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("HARVEST_LOCAL_PROVIDER_TEMPERATURE") {
            self.local_provider.temperature =
                parse_with("HARVEST_LOCAL_PROVIDER_TEMPERATURE", &value)?;
        }

        if let Some(value) = read_env("HARVEST_CLOUD_PROVIDER_ENABLED") {
            self.cloud_provider.enabled = parse_with("HARVEST_CLOUD_PROVIDER_ENABLED", &value)?;
        }
        if let Some(value) = read_env("HARVEST_CLOUD_PROVIDER_PROVIDER") {
            self.cloud_provider.provider = value;
        }
        if let Some(value) = read_env("HARVEST_CLOUD_PROVIDER_ENDPOINT") {
            self.cloud_provider.endpoint = Some(value);
        }
        if let Some(value) = read_env("HARVEST_CLOUD_PROVIDER_MODEL") {
            self.cloud_provider.model = value;
        }
        if let Some(value) = read_env("HARVEST_CLOUD_PROVIDER_REGION") {
            self.cloud_provider.region = Some(value);
        }
        if let Some(value) = read_env("HARVEST_CLOUD_PROVIDER_API_KEY") {
            self.cloud_provider.api_key = Some(secret_value(value));
        }

        if let Some(value) = read_env("HARVEST_PROBE_TIMEOUT_MS") {
            self.probe.timeout_ms = parse_with("HARVEST_PROBE_TIMEOUT_MS", &value)?;
        }

        if let Some(value) = read_env("HARVEST_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("HARVEST_SERVER_PORT") {
            self.server.port = parse_with("HARVEST_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("HARVEST_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_with("HARVEST_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("HARVEST_LOGGING_LEVEL").or_else(|| read_env("HARVEST_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("HARVEST_LOGGING_FORMAT").or_else(|| read_env("HARVEST_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(preferred_provider) = overrides.preferred_provider {
            self.routing.preferred_provider = preferred_provider;
        }
        if let Some(local_endpoint) = overrides.local_endpoint {
            self.local_provider.endpoint = local_endpoint;
        }
        if let Some(local_model) = overrides.local_model {
            self.local_provider.model = local_model;
        }
        if let Some(cloud_api_key) = overrides.cloud_api_key {
            self.cloud_provider.api_key = Some(secret_value(cloud_api_key));
        }
        if let Some(server_port) = overrides.server_port {
            self.server.port = server_port;
        }
        if let Some(probe_timeout_ms) = overrides.probe_timeout_ms {
            self.probe.timeout_ms = probe_timeout_ms;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_routing(&self.routing)?;
        validate_local_provider(&self.local_provider)?;
        validate_cloud_provider(&self.cloud_provider)?;
        validate_probe(&self.probe)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("harvest.toml"), PathBuf::from("config/harvest.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_routing(routing: &RoutingConfig) -> Result<(), ConfigError> {
    if routing.cost_threshold.is_some_and(|threshold| threshold < Decimal::ZERO) {
        return Err(ConfigError::Validation(
            "routing.cost_threshold must not be negative".to_string(),
        ));
    }
    if routing.latency_threshold_ms == Some(0) {
        return Err(ConfigError::Validation(
            "routing.latency_threshold_ms must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_local_provider(local: &LocalProviderConfig) -> Result<(), ConfigError> {
    if !local.enabled {
        return Ok(());
    }
    if local.provider.trim().is_empty() {
        return Err(ConfigError::Validation("local_provider.provider must not be empty".to_string()));
    }
    let endpoint = local.endpoint.trim();
    if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
        return Err(ConfigError::Validation(
            "local_provider.endpoint must start with http:// or https://".to_string(),
        ));
    }
    validate_sampling("local_provider", local.max_tokens, local.temperature)
}

fn validate_cloud_provider(cloud: &CloudProviderConfig) -> Result<(), ConfigError> {
    if !cloud.enabled {
        return Ok(());
    }
    if cloud.provider.trim().is_empty() {
        return Err(ConfigError::Validation("cloud_provider.provider must not be empty".to_string()));
    }
    let missing_key = cloud
        .api_key
        .as_ref()
        .map(|value| value.expose_secret().trim().is_empty())
        .unwrap_or(true);
    if missing_key {
        return Err(ConfigError::Validation(
            "cloud_provider.api_key is required when the cloud provider is enabled".to_string(),
        ));
    }
    if let Some(endpoint) = &cloud.endpoint {
        if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
            return Err(ConfigError::Validation(
                "cloud_provider.endpoint must start with http:// or https://".to_string(),
            ));
        }
    }
    validate_sampling("cloud_provider", cloud.max_tokens, cloud.temperature)
}

fn validate_sampling(section: &str, max_tokens: u32, temperature: f32) -> Result<(), ConfigError> {
    if max_tokens == 0 {
        return Err(ConfigError::Validation(format!(
            "{section}.max_tokens must be greater than zero"
        )));
    }
    if !(0.0..=2.0).contains(&temperature) {
        return Err(ConfigError::Validation(format!(
            "{section}.temperature must be in range 0.0..=2.0"
        )));
    }
    Ok(())
}

fn validate_probe(probe: &ProbeConfig) -> Result<(), ConfigError> {
    if probe.timeout_ms == 0 || probe.timeout_ms > 60_000 {
        return Err(ConfigError::Validation(
            "probe.timeout_ms must be in range 1..=60000".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_with<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    routing: Option<RoutingPatch>,
    local_provider: Option<LocalProviderPatch>,
    cloud_provider: Option<CloudProviderPatch>,
    probe: Option<ProbePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct RoutingPatch {
    preferred_provider: Option<PreferredProvider>,
    fallback_provider: Option<ProviderKind>,
    cost_threshold: Option<Decimal>,
    latency_threshold_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LocalProviderPatch {
    enabled: Option<bool>,
    provider: Option<String>,
    endpoint: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct CloudProviderPatch {
    enabled: Option<bool>,
    provider: Option<String>,
    endpoint: Option<String>,
    model: Option<String>,
    region: Option<String>,
    api_key: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbePatch {
    timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
