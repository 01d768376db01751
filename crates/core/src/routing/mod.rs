//! Provider selection policy.
//!
//! Selection is a pure function of the active [`RoutingPolicy`]; it never fails.
//! When nothing usable is configured it returns the placeholder spec, which
//! downstream backends treat as a no-op simulator.

pub mod store;

use std::fmt;

use serde::Serialize;

use crate::domain::provider::{PreferredProvider, ProviderKind, ProviderSpec, RoutingPolicy};

pub use store::{ConfigStore, PolicyPatch};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Classification,
    Extraction,
    Generation,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Classification => "classification",
            Self::Extraction => "extraction",
            Self::Generation => "generation",
        })
    }
}

/// Which branch of the policy produced a selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    Preferred,
    AutoLocal,
    AutoCloud,
    Fallback,
    Placeholder,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProviderSelection {
    pub spec: ProviderSpec,
    pub kind: Option<ProviderKind>,
    pub source: SelectionSource,
    pub operation: OperationKind,
}

impl ProviderSelection {
    pub fn provider_name(&self) -> &str {
        &self.spec.provider
    }
}

pub fn select_provider(policy: &RoutingPolicy, operation: OperationKind) -> ProviderSelection {
    let preferred = match policy.preferred_provider {
        PreferredProvider::Local => policy
            .local_provider
            .as_ref()
            .map(|spec| (spec, ProviderKind::Local, SelectionSource::Preferred)),
        PreferredProvider::Cloud => policy
            .cloud_provider
            .as_ref()
            .map(|spec| (spec, ProviderKind::Cloud, SelectionSource::Preferred)),
        PreferredProvider::Auto => policy
            .local_provider
            .as_ref()
            .map(|spec| (spec, ProviderKind::Local, SelectionSource::AutoLocal))
            .or_else(|| {
                policy
                    .cloud_provider
                    .as_ref()
                    .map(|spec| (spec, ProviderKind::Cloud, SelectionSource::AutoCloud))
            }),
    };

    if let Some((spec, kind, source)) = preferred {
        return ProviderSelection { spec: spec.clone(), kind: Some(kind), source, operation };
    }

    if let Some(kind) = policy.fallback_provider {
        if let Some(spec) = policy.spec_for(kind) {
            return ProviderSelection {
                spec: spec.clone(),
                kind: Some(kind),
                source: SelectionSource::Fallback,
                operation,
            };
        }
    }

    ProviderSelection {
        spec: ProviderSpec::placeholder(),
        kind: None,
        source: SelectionSource::Placeholder,
        operation,
    }
}

#[cfg(test)]
mod tests {
    use super::{select_provider, OperationKind, SelectionSource};
    use crate::domain::provider::{
        PreferredProvider, ProviderKind, ProviderSpec, RoutingPolicy, PLACEHOLDER_PROVIDER,
    };

    fn local() -> ProviderSpec {
        ProviderSpec::new("ollama").with_endpoint("http://localhost:11434").with_model("llama3.1")
    }

    fn cloud() -> ProviderSpec {
        ProviderSpec::new("openai").with_model("gpt-4o-mini")
    }

    #[test]
    fn auto_prefers_local_when_both_are_configured() {
        let policy = RoutingPolicy {
            local_provider: Some(local()),
            cloud_provider: Some(cloud()),
            ..RoutingPolicy::default()
        };
        let selection = select_provider(&policy, OperationKind::Classification);
        assert_eq!(selection.provider_name(), "ollama");
        assert_eq!(selection.kind, Some(ProviderKind::Local));
        assert_eq!(selection.source, SelectionSource::AutoLocal);
    }

    #[test]
    fn auto_uses_cloud_without_local_spec() {
        let policy = RoutingPolicy { cloud_provider: Some(cloud()), ..RoutingPolicy::default() };
        let selection = select_provider(&policy, OperationKind::Generation);
        assert_eq!(selection.provider_name(), "openai");
        assert_eq!(selection.source, SelectionSource::AutoCloud);
    }

    #[test]
    fn explicit_preference_is_honoured() {
        let policy = RoutingPolicy {
            preferred_provider: PreferredProvider::Cloud,
            local_provider: Some(local()),
            cloud_provider: Some(cloud()),
            ..RoutingPolicy::default()
        };
        let selection = select_provider(&policy, OperationKind::Extraction);
        assert_eq!(selection.provider_name(), "openai");
        assert_eq!(selection.source, SelectionSource::Preferred);
    }

    #[test]
    fn missing_preferred_spec_uses_fallback_provider() {
        let policy = RoutingPolicy {
            preferred_provider: PreferredProvider::Cloud,
            fallback_provider: Some(ProviderKind::Local),
            local_provider: Some(local()),
            ..RoutingPolicy::default()
        };
        let selection = select_provider(&policy, OperationKind::Generation);
        assert_eq!(selection.provider_name(), "ollama");
        assert_eq!(selection.source, SelectionSource::Fallback);
    }

    #[test]
    fn nothing_configured_degrades_to_placeholder() {
        let policy = RoutingPolicy {
            preferred_provider: PreferredProvider::Local,
            fallback_provider: Some(ProviderKind::Cloud),
            ..RoutingPolicy::default()
        };
        let selection = select_provider(&policy, OperationKind::Classification);
        assert_eq!(selection.provider_name(), PLACEHOLDER_PROVIDER);
        assert!(selection.spec.is_placeholder());
        assert_eq!(selection.kind, None);
        assert_eq!(selection.source, SelectionSource::Placeholder);
    }
}
