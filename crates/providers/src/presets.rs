//! Known local inference services and the model tiers recommended for each.

use serde::Serialize;

use harvest_core::domain::provider::ProviderSpec;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Recommended,
    Lightweight,
    Performance,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recommended => "recommended",
            Self::Lightweight => "lightweight",
            Self::Performance => "performance",
        }
    }

    /// Picks a tier from a free-form GPU description such as `"RTX 4090 24GB"`
    /// or `"integrated"`.
    pub fn from_gpu_hint(hint: Option<&str>) -> Self {
        let Some(hint) = hint.map(|value| value.trim().to_ascii_lowercase()) else {
            return Self::Recommended;
        };
        if ["cpu", "integrated", "none", "igpu"].iter().any(|marker| hint.contains(marker)) {
            return Self::Lightweight;
        }
        match vram_gb(&hint) {
            Some(vram) if vram >= 16 => Self::Performance,
            Some(vram) if vram < 8 => Self::Lightweight,
            _ => Self::Recommended,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ModelTiers {
    pub recommended: &'static str,
    pub lightweight: &'static str,
    pub performance: &'static str,
}

impl ModelTiers {
    pub fn model_for(&self, tier: ModelTier) -> &'static str {
        match tier {
            ModelTier::Recommended => self.recommended,
            ModelTier::Lightweight => self.lightweight,
            ModelTier::Performance => self.performance,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LocalPreset {
    pub name: &'static str,
    pub display_name: &'static str,
    pub endpoint: &'static str,
    /// GET path listing installed models; doubles as the liveness check.
    pub probe_path: &'static str,
    pub install: &'static str,
    pub start: &'static str,
    pub pull: &'static str,
    pub models: ModelTiers,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl LocalPreset {
    pub fn spec(&self, tier: ModelTier) -> ProviderSpec {
        ProviderSpec::new(self.name)
            .with_endpoint(self.endpoint)
            .with_model(self.models.model_for(tier))
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
    }

    pub fn pull_command(&self, model: &str) -> String {
        self.pull.replace("{model}", model)
    }
}

pub static PRESETS: [LocalPreset; 2] = [
    LocalPreset {
        name: "ollama",
        display_name: "Ollama",
        endpoint: "http://localhost:11434",
        probe_path: "/api/tags",
        install: "curl -fsSL https://ollama.com/install.sh | sh",
        start: "ollama serve",
        pull: "ollama pull {model}",
        models: ModelTiers {
            recommended: "llama3.1:8b",
            lightweight: "llama3.2:3b",
            performance: "llama3.1:70b",
        },
        max_tokens: 2048,
        temperature: 0.7,
    },
    LocalPreset {
        name: "lmstudio",
        display_name: "LM Studio",
        endpoint: "http://localhost:1234",
        probe_path: "/v1/models",
        install: "Download LM Studio from https://lmstudio.ai and install it",
        start: "Open LM Studio and start the local server from the Developer tab",
        pull: "Search for {model} in LM Studio and download it",
        models: ModelTiers {
            recommended: "meta-llama-3.1-8b-instruct",
            lightweight: "llama-3.2-3b-instruct",
            performance: "qwen2.5-32b-instruct",
        },
        max_tokens: 2048,
        temperature: 0.7,
    },
];

pub fn find_preset(name: &str) -> Option<&'static LocalPreset> {
    let wanted: String =
        name.trim().chars().filter(|ch| ch.is_ascii_alphanumeric()).collect::<String>().to_ascii_lowercase();
    PRESETS.iter().find(|preset| preset.name == wanted)
}

/// Number right before `gb`, e.g. `12` in `"rtx 3060 12 gb"`.
fn vram_gb(hint: &str) -> Option<u32> {
    let index = hint.find("gb")?;
    let before = hint[..index].trim_end();
    let start = before.rfind(|ch: char| !ch.is_ascii_digit()).map(|position| position + 1).unwrap_or(0);
    before[start..].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::{find_preset, ModelTier, PRESETS};

    #[test]
    fn gpu_hints_map_to_tiers() {
        assert_eq!(ModelTier::from_gpu_hint(None), ModelTier::Recommended);
        assert_eq!(ModelTier::from_gpu_hint(Some("RTX 4090 24GB")), ModelTier::Performance);
        assert_eq!(ModelTier::from_gpu_hint(Some("rtx 3060 12 GB")), ModelTier::Recommended);
        assert_eq!(ModelTier::from_gpu_hint(Some("GTX 1650 4GB")), ModelTier::Lightweight);
        assert_eq!(ModelTier::from_gpu_hint(Some("Intel integrated")), ModelTier::Lightweight);
        assert_eq!(ModelTier::from_gpu_hint(Some("Apple M2")), ModelTier::Recommended);
    }

    #[test]
    fn presets_are_found_by_loose_name() {
        assert_eq!(find_preset("Ollama").map(|preset| preset.endpoint), Some("http://localhost:11434"));
        assert_eq!(find_preset("LM Studio").map(|preset| preset.endpoint), Some("http://localhost:1234"));
        assert!(find_preset("vllm").is_none());
    }

    #[test]
    fn preset_spec_carries_tier_model() {
        let spec = PRESETS[0].spec(ModelTier::Lightweight);
        assert_eq!(spec.provider, "ollama");
        assert_eq!(spec.model.as_deref(), Some("llama3.2:3b"));
        assert_eq!(spec.max_tokens, Some(2048));
        assert_eq!(PRESETS[0].pull_command("llama3.2:3b"), "ollama pull llama3.2:3b");
    }
}
