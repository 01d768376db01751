//! Per-model cost lookup used to attribute request cost in metrics.
//!
//! Prices are USD per token. Local and simulated providers cost nothing.

use rust_decimal::Decimal;

use crate::domain::provider::ProviderSpec;

/// Known per-token costs as `(input, output)`, or `None` for unknown models.
pub fn model_cost(model_id: &str) -> Option<(Decimal, Decimal)> {
    let id = model_id.rsplit_once('/').map(|(_, name)| name).unwrap_or(model_id);

    match id {
        "gpt-4o-mini" => Some((Decimal::new(15, 8), Decimal::new(6, 7))),
        "gpt-4o" => Some((Decimal::new(25, 7), Decimal::new(1, 5))),
        "gpt-5-mini" => Some((Decimal::new(25, 8), Decimal::new(2, 6))),
        "claude-3-5-haiku-latest" | "claude-haiku-4.5" => {
            Some((Decimal::new(1, 6), Decimal::new(5, 6)))
        }
        "claude-sonnet-4" | "claude-3-5-sonnet-latest" => {
            Some((Decimal::new(3, 6), Decimal::new(15, 6)))
        }
        "gemini-2.5-flash" => Some((Decimal::new(15, 8), Decimal::new(6, 7))),
        _ if is_local_model(id) => Some((Decimal::ZERO, Decimal::ZERO)),
        _ => None,
    }
}

/// Conservative cost for unknown cloud models.
pub fn default_cost() -> (Decimal, Decimal) {
    (Decimal::new(25, 8), Decimal::new(2, 6))
}

pub fn is_local_provider(spec: &ProviderSpec) -> bool {
    if spec.is_placeholder() {
        return true;
    }
    let provider = spec.provider.to_ascii_lowercase();
    if matches!(provider.as_str(), "ollama" | "lmstudio" | "llamacpp" | "local") {
        return true;
    }
    spec.endpoint
        .as_deref()
        .map(|endpoint| endpoint.contains("localhost") || endpoint.contains("127.0.0.1"))
        .unwrap_or(false)
}

/// Estimated cost of one request against `spec`.
pub fn estimate_cost(spec: &ProviderSpec, input_tokens: u32, output_tokens: u32) -> Decimal {
    if is_local_provider(spec) {
        return Decimal::ZERO;
    }
    let (input_price, output_price) = spec
        .model
        .as_deref()
        .and_then(model_cost)
        .unwrap_or_else(default_cost);
    Decimal::from(input_tokens) * input_price + Decimal::from(output_tokens) * output_price
}

/// Rough token estimate (four characters per token).
pub fn estimate_tokens(text: &str) -> u32 {
    let tokens = (text.chars().count() + 3) / 4;
    u32::try_from(tokens).unwrap_or(u32::MAX).max(1)
}

fn is_local_model(model_id: &str) -> bool {
    let lower = model_id.to_ascii_lowercase();
    ["llama", "mistral", "phi", "gemma", "qwen", "deepseek", "tinyllama"]
        .iter()
        .any(|prefix| lower.starts_with(prefix))
        || lower.contains(":latest")
        || lower.contains(":instruct")
        || lower.contains(":7b")
        || lower.contains(":8b")
        || lower.contains(":70b")
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{estimate_cost, estimate_tokens, model_cost};
    use crate::domain::provider::ProviderSpec;

    #[test]
    fn provider_prefix_is_stripped() {
        assert_eq!(model_cost("openai/gpt-4o-mini"), model_cost("gpt-4o-mini"));
    }

    #[test]
    fn local_models_are_free() {
        let (input, output) = model_cost("llama3.1:8b").expect("local model should be known");
        assert_eq!(input, Decimal::ZERO);
        assert_eq!(output, Decimal::ZERO);
    }

    #[test]
    fn local_provider_requests_cost_nothing() {
        let spec = ProviderSpec::new("ollama")
            .with_endpoint("http://localhost:11434")
            .with_model("llama3.1");
        assert_eq!(estimate_cost(&spec, 500, 500), Decimal::ZERO);
        assert_eq!(estimate_cost(&ProviderSpec::placeholder(), 500, 500), Decimal::ZERO);
    }

    #[test]
    fn cloud_requests_use_model_pricing() {
        let spec = ProviderSpec::new("openai").with_model("gpt-4o-mini");
        let cost = estimate_cost(&spec, 1_000, 1_000);
        assert_eq!(cost, Decimal::new(75, 5));
    }

    #[test]
    fn unknown_cloud_models_use_default_pricing() {
        let spec = ProviderSpec::new("acme-cloud").with_model("acme-large");
        assert!(estimate_cost(&spec, 100, 100) > Decimal::ZERO);
    }

    #[test]
    fn token_estimate_is_never_zero() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("12345678"), 2);
    }
}
