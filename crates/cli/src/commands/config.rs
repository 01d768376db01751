use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use harvest_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for entry in entries(&config) {
        let source = field_source(
            entry.key_path,
            entry.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(entry.key_path, &entry.value, source));
    }

    lines.join("\n")
}

struct Entry {
    key_path: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn entry(key_path: &'static str, value: String, env_keys: &'static [&'static str]) -> Entry {
    Entry { key_path, value, env_keys }
}

fn entries(config: &AppConfig) -> Vec<Entry> {
    let routing = &config.routing;
    let local = &config.local_provider;
    let cloud = &config.cloud_provider;

    vec![
        entry(
            "routing.preferred_provider",
            routing.preferred_provider.to_string(),
            &["HARVEST_ROUTING_PREFERRED_PROVIDER"],
        ),
        entry(
            "routing.fallback_provider",
            optional(routing.fallback_provider.map(|kind| kind.to_string())),
            &["HARVEST_ROUTING_FALLBACK_PROVIDER"],
        ),
        entry(
            "routing.cost_threshold",
            optional(routing.cost_threshold.map(|threshold| threshold.to_string())),
            &["HARVEST_ROUTING_COST_THRESHOLD"],
        ),
        entry(
            "routing.latency_threshold_ms",
            optional(routing.latency_threshold_ms.map(|threshold| threshold.to_string())),
            &["HARVEST_ROUTING_LATENCY_THRESHOLD_MS"],
        ),
        entry("local_provider.enabled", local.enabled.to_string(), &["HARVEST_LOCAL_PROVIDER_ENABLED"]),
        entry("local_provider.provider", local.provider.clone(), &["HARVEST_LOCAL_PROVIDER_PROVIDER"]),
        entry("local_provider.endpoint", local.endpoint.clone(), &["HARVEST_LOCAL_PROVIDER_ENDPOINT"]),
        entry("local_provider.model", local.model.clone(), &["HARVEST_LOCAL_PROVIDER_MODEL"]),
        entry(
            "local_provider.max_tokens",
            local.max_tokens.to_string(),
            &["HARVEST_LOCAL_PROVIDER_MAX_TOKENS"],
        ),
        entry(
            "local_provider.temperature",
            local.temperature.to_string(),
            &["HARVEST_LOCAL_PROVIDER_TEMPERATURE"],
        ),
        entry("cloud_provider.enabled", cloud.enabled.to_string(), &["HARVEST_CLOUD_PROVIDER_ENABLED"]),
        entry("cloud_provider.provider", cloud.provider.clone(), &["HARVEST_CLOUD_PROVIDER_PROVIDER"]),
        entry("cloud_provider.endpoint", optional(cloud.endpoint.clone()), &["HARVEST_CLOUD_PROVIDER_ENDPOINT"]),
        entry("cloud_provider.model", cloud.model.clone(), &["HARVEST_CLOUD_PROVIDER_MODEL"]),
        entry("cloud_provider.region", optional(cloud.region.clone()), &["HARVEST_CLOUD_PROVIDER_REGION"]),
        entry(
            "cloud_provider.api_key",
            redact_key(cloud.api_key.as_ref().map(|key| key.expose_secret())),
            &["HARVEST_CLOUD_PROVIDER_API_KEY"],
        ),
        entry("probe.timeout_ms", config.probe.timeout_ms.to_string(), &["HARVEST_PROBE_TIMEOUT_MS"]),
        entry("server.bind_address", config.server.bind_address.clone(), &["HARVEST_SERVER_BIND_ADDRESS"]),
        entry("server.port", config.server.port.to_string(), &["HARVEST_SERVER_PORT"]),
        entry(
            "logging.level",
            config.logging.level.clone(),
            &["HARVEST_LOGGING_LEVEL", "HARVEST_LOG_LEVEL"],
        ),
        entry(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["HARVEST_LOGGING_FORMAT", "HARVEST_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("harvest.toml"), PathBuf::from("config/harvest.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn optional(value: Option<String>) -> String {
    value.unwrap_or_else(|| "<unset>".to_string())
}

/// Keeps a recognisable prefix such as `sk-` and hides the rest.
fn redact_key(key: Option<&str>) -> String {
    let Some(key) = key.map(str::trim) else {
        return "<unset>".to_string();
    };
    if key.is_empty() {
        return "<empty>".to_string();
    }
    if let Some((prefix, _)) = key.split_once('-') {
        return format!("{prefix}-***");
    }
    "<redacted>".to_string()
}
