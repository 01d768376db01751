use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use reqwest::Url;
use serde::Serialize;
use serde_json::Value;
use tera::{Context, Tera};
use tracing::{info, warn};

use harvest_core::config::ProbeConfig;
use harvest_core::domain::provider::ProviderSpec;

use crate::error::ProviderError;
use crate::presets::{find_preset, LocalPreset, ModelTier, PRESETS};
use crate::probe::{HttpProbe, ServiceProbe};

const OPENAI_COMPATIBLE_MODELS_PATH: &str = "/v1/models";
const MAX_TOKENS_ADVISORY: u32 = 4096;

const SETUP_TEMPLATE: &str = "\
{{ display_name }} setup
1. Install: {{ install }}
2. Start the service: {{ start }}
3. Download the {{ tier }} model: {{ pull }}
4. Point harvest at it:
   HARVEST_LOCAL_PROVIDER_PROVIDER={{ name }}
   HARVEST_LOCAL_PROVIDER_ENDPOINT={{ endpoint }}
   HARVEST_LOCAL_PROVIDER_MODEL={{ model }}

Model tiers:
{% for entry in tiers %}  - {{ entry.tier }}: {{ entry.model }}
{% endfor %}";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecommendedSetup {
    pub provider: String,
    pub display_name: String,
    pub tier: ModelTier,
    pub spec: ProviderSpec,
    pub notes: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DetectionReport {
    pub ollama: bool,
    pub lmstudio: bool,
    /// Reachable services keyed by provider name.
    pub endpoints: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct TierLine {
    tier: &'static str,
    model: &'static str,
}

/// Setup, validation and discovery for local inference services.
pub struct LocalProviderManager {
    probe: Arc<dyn ServiceProbe>,
}

impl LocalProviderManager {
    pub fn new(probe: Arc<dyn ServiceProbe>) -> Self {
        Self { probe }
    }

    pub fn from_config(config: &ProbeConfig) -> Result<Self, ProviderError> {
        Ok(Self::new(Arc::new(HttpProbe::from_config(config)?)))
    }

    pub fn known_providers(&self) -> Vec<&'static str> {
        PRESETS.iter().map(|preset| preset.name).collect()
    }

    pub fn recommended_setup(&self, gpu_hint: Option<&str>) -> RecommendedSetup {
        let preset = &PRESETS[0];
        let tier = ModelTier::from_gpu_hint(gpu_hint);
        let spec = preset.spec(tier);
        let model = preset.models.model_for(tier);
        RecommendedSetup {
            provider: preset.name.to_string(),
            display_name: preset.display_name.to_string(),
            tier,
            spec,
            notes: vec![preset.install.to_string(), preset.start.to_string(), preset.pull_command(model)],
        }
    }

    pub fn provider_config(&self, name: &str) -> Result<ProviderSpec, ProviderError> {
        find_preset(name)
            .map(|preset| preset.spec(ModelTier::Recommended))
            .ok_or_else(|| ProviderError::UnknownProvider(name.to_string()))
    }

    /// Checks the endpoint format, reachability and model availability.
    /// Never fails; every problem is reported as an issue or suggestion.
    pub async fn validate_config(&self, spec: &ProviderSpec) -> ValidationReport {
        let mut report = ValidationReport::default();
        let preset = find_preset(&spec.provider);
        let model = spec.model.as_deref().map(str::trim).filter(|model| !model.is_empty());

        if model.is_none() {
            report.issues.push("No model specified".to_string());
        }
        if spec.max_tokens.is_some_and(|tokens| tokens > MAX_TOKENS_ADVISORY) {
            report.suggestions.push(format!(
                "max_tokens above {MAX_TOKENS_ADVISORY} may slow down local inference; consider 2048"
            ));
        }

        let endpoint = spec.endpoint.as_deref().or(preset.map(|preset| preset.endpoint));
        let Some(endpoint) = endpoint.filter(|endpoint| is_valid_endpoint(endpoint)) else {
            report.issues.push("Invalid endpoint URL format".to_string());
            report.valid = false;
            return report;
        };

        let probe_path = preset.map(|preset| preset.probe_path).unwrap_or(OPENAI_COMPATIBLE_MODELS_PATH);
        let url = probe_url(endpoint, probe_path);
        match self.probe.get(&url).await {
            Err(error) => {
                warn!(
                    event_name = "providers.probe.failed",
                    provider = %spec.provider,
                    url = %url,
                    error = %error,
                    "local provider probe failed"
                );
                report.issues.push("Cannot connect to local AI service".to_string());
                report.suggestions.push(match preset {
                    Some(preset) => format!(
                        "Make sure {} is running at {endpoint} (start it with: {})",
                        preset.display_name, preset.start
                    ),
                    None => format!("Make sure the service is running at {endpoint}"),
                });
            }
            Ok(response) if !response.is_success() => {
                report.issues.push(format!("Endpoint not reachable: {}", response.status));
            }
            Ok(response) => {
                if let Some(model) = model {
                    let installed = listed_models(&response.body);
                    if !installed.iter().any(|listed| model_matches(listed, model)) {
                        report.suggestions.push(match preset {
                            Some(preset) => format!(
                                "Model {model} is not installed. {}",
                                preset.pull_command(model)
                            ),
                            None => format!("Model {model} is not installed on this service"),
                        });
                    }
                }
            }
        }

        report.valid = report.issues.is_empty();
        report
    }

    pub fn setup_instructions(&self, provider: Option<&str>) -> Result<String, ProviderError> {
        self.setup_instructions_for_tier(provider, ModelTier::Recommended)
    }

    pub fn setup_instructions_for_tier(
        &self,
        provider: Option<&str>,
        tier: ModelTier,
    ) -> Result<String, ProviderError> {
        let preset = match provider {
            Some(name) => find_preset(name).ok_or_else(|| ProviderError::UnknownProvider(name.to_string()))?,
            None => &PRESETS[0],
        };
        let model = preset.models.model_for(tier);

        let mut context = Context::new();
        context.insert("display_name", preset.display_name);
        context.insert("name", preset.name);
        context.insert("install", preset.install);
        context.insert("start", preset.start);
        context.insert("pull", &preset.pull_command(model));
        context.insert("endpoint", preset.endpoint);
        context.insert("model", model);
        context.insert("tier", tier.as_str());
        context.insert("tiers", &tier_lines(preset));

        Ok(Tera::one_off(SETUP_TEMPLATE, &context, false)?)
    }

    /// Probes every known service concurrently. An unreachable service is
    /// reported as unavailable.
    pub async fn detect_available_services(&self) -> DetectionReport {
        let probes = PRESETS.iter().map(|preset| async move {
            let url = probe_url(preset.endpoint, preset.probe_path);
            let available = match self.probe.get(&url).await {
                Ok(response) => response.is_success(),
                Err(error) => {
                    warn!(
                        event_name = "providers.probe.failed",
                        provider = preset.name,
                        url = %url,
                        error = %error,
                        "local provider probe failed"
                    );
                    false
                }
            };
            (preset, available)
        });

        let mut report = DetectionReport::default();
        for (preset, available) in join_all(probes).await {
            if !available {
                continue;
            }
            match preset.name {
                "ollama" => report.ollama = true,
                "lmstudio" => report.lmstudio = true,
                _ => {}
            }
            report.endpoints.insert(preset.name.to_string(), preset.endpoint.to_string());
        }

        info!(
            event_name = "providers.detect.completed",
            ollama = report.ollama,
            lmstudio = report.lmstudio,
            "local service detection completed"
        );
        report
    }
}

fn is_valid_endpoint(endpoint: &str) -> bool {
    Url::parse(endpoint)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}

fn probe_url(endpoint: &str, path: &str) -> String {
    format!("{}{path}", endpoint.trim_end_matches('/'))
}

/// Model names from an Ollama `{"models":[{"name"}]}` or OpenAI-style
/// `{"data":[{"id"}]}` listing.
fn listed_models(body: &str) -> Vec<String> {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return Vec::new();
    };
    let ollama = value.get("models").and_then(Value::as_array).into_iter().flatten();
    let openai = value.get("data").and_then(Value::as_array).into_iter().flatten();

    ollama
        .filter_map(|model| model.get("name").and_then(Value::as_str))
        .chain(openai.filter_map(|model| model.get("id").and_then(Value::as_str)))
        .map(str::to_string)
        .collect()
}

/// `llama3.1` matches an installed `llama3.1:latest`.
fn model_matches(listed: &str, wanted: &str) -> bool {
    listed.eq_ignore_ascii_case(wanted)
        || (!wanted.contains(':') && listed.eq_ignore_ascii_case(&format!("{wanted}:latest")))
}

fn tier_lines(preset: &LocalPreset) -> Vec<TierLine> {
    [ModelTier::Recommended, ModelTier::Lightweight, ModelTier::Performance]
        .into_iter()
        .map(|tier| TierLine { tier: tier.as_str(), model: preset.models.model_for(tier) })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;

    use harvest_core::domain::provider::ProviderSpec;

    use super::{listed_models, LocalProviderManager};
    use crate::error::ProviderError;
    use crate::presets::ModelTier;
    use crate::probe::{ProbeResponse, ServiceProbe};

    /// Answers from a fixed table; unknown URLs behave like a refused connection.
    struct StaticProbe {
        responses: HashMap<String, ProbeResponse>,
    }

    impl StaticProbe {
        fn with(entries: &[(&str, u16, &str)]) -> Arc<Self> {
            let responses = entries
                .iter()
                .map(|(url, status, body)| {
                    (url.to_string(), ProbeResponse { status: *status, body: body.to_string() })
                })
                .collect();
            Arc::new(Self { responses })
        }
    }

    #[async_trait]
    impl ServiceProbe for StaticProbe {
        async fn get(&self, url: &str) -> Result<ProbeResponse, ProviderError> {
            self.responses.get(url).cloned().ok_or_else(|| ProviderError::Probe {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            })
        }
    }

    const OLLAMA_TAGS: &str = r#"{"models":[{"name":"llama3.1:8b"},{"name":"mistral:latest"}]}"#;

    fn ollama_spec(model: &str) -> ProviderSpec {
        ProviderSpec::new("ollama").with_endpoint("http://localhost:11434").with_model(model)
    }

    #[test]
    fn recommended_setup_follows_gpu_hint() {
        let manager = LocalProviderManager::new(StaticProbe::with(&[]));
        let setup = manager.recommended_setup(Some("RTX 4090 24GB"));

        assert_eq!(setup.provider, "ollama");
        assert_eq!(setup.tier, ModelTier::Performance);
        assert_eq!(setup.spec.model.as_deref(), Some("llama3.1:70b"));
        assert!(setup.notes.iter().any(|note| note == "ollama pull llama3.1:70b"));
    }

    #[test]
    fn provider_config_returns_preset_endpoints() {
        let manager = LocalProviderManager::new(StaticProbe::with(&[]));
        let lmstudio = manager.provider_config("lmstudio").expect("lmstudio preset");
        assert_eq!(lmstudio.endpoint.as_deref(), Some("http://localhost:1234"));
        assert!(matches!(manager.provider_config("vllm"), Err(ProviderError::UnknownProvider(_))));
    }

    #[tokio::test]
    async fn valid_config_with_installed_model_passes() {
        let manager =
            LocalProviderManager::new(StaticProbe::with(&[("http://localhost:11434/api/tags", 200, OLLAMA_TAGS)]));
        let report = manager.validate_config(&ollama_spec("llama3.1:8b")).await;

        assert!(report.valid, "{report:?}");
        assert!(report.issues.is_empty());
        assert!(report.suggestions.is_empty());
    }

    #[tokio::test]
    async fn malformed_endpoint_is_reported_without_probing() {
        let manager = LocalProviderManager::new(StaticProbe::with(&[]));
        let spec = ProviderSpec::new("ollama").with_endpoint("localhost:11434").with_model("llama3.1:8b");
        let report = manager.validate_config(&spec).await;

        assert!(!report.valid);
        assert_eq!(report.issues, vec!["Invalid endpoint URL format".to_string()]);
    }

    #[tokio::test]
    async fn unreachable_service_suggests_starting_it() {
        let manager = LocalProviderManager::new(StaticProbe::with(&[]));
        let report = manager.validate_config(&ollama_spec("llama3.1:8b")).await;

        assert!(!report.valid);
        assert_eq!(report.issues, vec!["Cannot connect to local AI service".to_string()]);
        assert!(report.suggestions[0].contains("ollama serve"));
    }

    #[tokio::test]
    async fn error_status_and_missing_model_are_issues() {
        let manager =
            LocalProviderManager::new(StaticProbe::with(&[("http://localhost:11434/api/tags", 503, "")]));
        let spec = ProviderSpec::new("ollama").with_endpoint("http://localhost:11434/");
        let report = manager.validate_config(&spec).await;

        assert!(!report.valid);
        assert!(report.issues.contains(&"No model specified".to_string()));
        assert!(report.issues.contains(&"Endpoint not reachable: 503".to_string()));
    }

    #[tokio::test]
    async fn absent_model_and_large_budget_are_suggestions_only() {
        let manager =
            LocalProviderManager::new(StaticProbe::with(&[("http://localhost:11434/api/tags", 200, OLLAMA_TAGS)]));
        let report = manager.validate_config(&ollama_spec("qwen2.5:14b").with_max_tokens(8192)).await;

        assert!(report.valid);
        assert_eq!(report.suggestions.len(), 2);
        assert!(report.suggestions.iter().any(|suggestion| suggestion.contains("ollama pull qwen2.5:14b")));
    }

    #[test]
    fn setup_instructions_render_the_preset() {
        let manager = LocalProviderManager::new(StaticProbe::with(&[]));
        let text = manager.setup_instructions(None).expect("template renders");

        assert!(text.starts_with("Ollama setup"));
        assert!(text.contains("HARVEST_LOCAL_PROVIDER_ENDPOINT=http://localhost:11434"));
        assert!(text.contains("  - lightweight: llama3.2:3b"));
        assert!(matches!(manager.setup_instructions(Some("vllm")), Err(ProviderError::UnknownProvider(_))));
    }

    #[tokio::test]
    async fn detection_reports_each_service_independently() {
        let manager = LocalProviderManager::new(StaticProbe::with(&[(
            "http://localhost:1234/v1/models",
            200,
            r#"{"data":[{"id":"meta-llama-3.1-8b-instruct"}]}"#,
        )]));
        let report = manager.detect_available_services().await;

        assert!(!report.ollama);
        assert!(report.lmstudio);
        assert_eq!(report.endpoints.get("lmstudio").map(String::as_str), Some("http://localhost:1234"));
        assert!(!report.endpoints.contains_key("ollama"));
    }

    #[test]
    fn model_listings_accept_both_shapes() {
        assert_eq!(listed_models(OLLAMA_TAGS), vec!["llama3.1:8b".to_string(), "mistral:latest".to_string()]);
        assert_eq!(listed_models(r#"{"data":[{"id":"phi-3"}]}"#), vec!["phi-3".to_string()]);
        assert!(listed_models("not json").is_empty());
    }
}
