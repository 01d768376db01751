use std::sync::{Arc, RwLock};

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use crate::domain::provider::{PreferredProvider, ProviderKind, ProviderSpec, RoutingPolicy};
use crate::errors::ApplicationError;

/// Partial policy update. Absent fields keep their current value; unknown
/// fields are ignored so older clients can keep sending their payloads.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct PolicyPatch {
    #[serde(default)]
    pub preferred_provider: Option<PreferredProvider>,
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

impl PolicyPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    fn apply_to(self, policy: &mut RoutingPolicy) {
        if let Some(value) = self.preferred_provider {
            policy.preferred_provider = value;
        }
        if let Some(value) = self.fallback_provider {
            policy.fallback_provider = Some(value);
        }
        if let Some(value) = self.cost_threshold {
            policy.cost_threshold = Some(value);
        }
        if let Some(value) = self.latency_threshold_ms {
            policy.latency_threshold_ms = Some(value);
        }
        if let Some(value) = self.cloud_provider {
            policy.cloud_provider = Some(value);
        }
        if let Some(value) = self.local_provider {
            policy.local_provider = Some(value);
        }
    }
}

/// Holds the active routing policy. Updates build a new policy and swap it in
/// whole, so readers always see a consistent snapshot.
#[derive(Debug)]
pub struct ConfigStore {
    current: RwLock<Arc<RoutingPolicy>>,
}

impl ConfigStore {
    pub fn new(policy: RoutingPolicy) -> Self {
        Self { current: RwLock::new(Arc::new(policy)) }
    }

    pub fn get(&self) -> Arc<RoutingPolicy> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn update(&self, patch: PolicyPatch) -> Result<Arc<RoutingPolicy>, ApplicationError> {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut next = RoutingPolicy::clone(&guard);
        patch.apply_to(&mut next);
        validate_policy(&next)?;

        info!(
            event_name = "config.policy.updated",
            preferred_provider = %next.preferred_provider,
            local_configured = next.local_provider.is_some(),
            cloud_configured = next.cloud_provider.is_some(),
            "routing policy replaced"
        );
        let next = Arc::new(next);
        *guard = Arc::clone(&next);
        Ok(next)
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(RoutingPolicy::default())
    }
}

pub fn validate_policy(policy: &RoutingPolicy) -> Result<(), ApplicationError> {
    if let Some(threshold) = policy.cost_threshold {
        if threshold < Decimal::ZERO {
            return Err(ApplicationError::Configuration(
                "cost_threshold must not be negative".to_string(),
            ));
        }
    }
    if policy.latency_threshold_ms == Some(0) {
        return Err(ApplicationError::Configuration(
            "latency_threshold_ms must be greater than zero".to_string(),
        ));
    }
    let specs = [("cloud_provider", &policy.cloud_provider), ("local_provider", &policy.local_provider)];
    for (label, spec) in specs {
        let Some(spec) = spec else { continue };
        if spec.provider.trim().is_empty() {
            return Err(ApplicationError::Configuration(format!(
                "{label}.provider must not be empty"
            )));
        }
        if let Some(temperature) = spec.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ApplicationError::Configuration(format!(
                    "{label}.temperature must be between 0.0 and 2.0"
                )));
            }
        }
        if spec.max_tokens == Some(0) {
            return Err(ApplicationError::Configuration(format!(
                "{label}.max_tokens must be greater than zero"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use super::{ConfigStore, PolicyPatch};
    use crate::domain::provider::{PreferredProvider, ProviderSpec, RoutingPolicy};
    use crate::errors::ApplicationError;

    #[test]
    fn patch_keeps_fields_it_does_not_mention() {
        let store = ConfigStore::new(RoutingPolicy {
            local_provider: Some(ProviderSpec::new("ollama")),
            latency_threshold_ms: Some(800),
            ..RoutingPolicy::default()
        });

        let updated = store
            .update(PolicyPatch {
                preferred_provider: Some(PreferredProvider::Cloud),
                ..PolicyPatch::default()
            })
            .expect("valid patch");

        assert_eq!(updated.preferred_provider, PreferredProvider::Cloud);
        assert_eq!(updated.latency_threshold_ms, Some(800));
        assert_eq!(updated.local_provider.as_ref().map(|spec| spec.provider.as_str()), Some("ollama"));
    }

    #[test]
    fn readers_keep_their_snapshot_across_updates() {
        let store = ConfigStore::default();
        let before = store.get();
        store
            .update(PolicyPatch { cost_threshold: Some(Decimal::new(5, 2)), ..PolicyPatch::default() })
            .expect("valid patch");

        assert_eq!(before.cost_threshold, None);
        assert_eq!(store.get().cost_threshold, Some(Decimal::new(5, 2)));
        assert!(!Arc::ptr_eq(&before, &store.get()));
    }

    #[test]
    fn invalid_patch_is_rejected_and_policy_is_unchanged() {
        let store = ConfigStore::default();
        let error = store
            .update(PolicyPatch { cost_threshold: Some(Decimal::new(-1, 0)), ..PolicyPatch::default() })
            .expect_err("negative threshold must be rejected");

        assert!(matches!(error, ApplicationError::Configuration(_)));
        assert_eq!(*store.get(), RoutingPolicy::default());
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        let store = ConfigStore::default();
        let result = store.update(PolicyPatch {
            cloud_provider: Some(ProviderSpec::new("openai").with_temperature(3.5)),
            ..PolicyPatch::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn patch_json_ignores_unknown_fields() {
        let patch: PolicyPatch = serde_json::from_str(
            r#"{"preferred_provider":"local","legacy_flag":true,"latency_threshold_ms":250}"#,
        )
        .expect("patch should deserialize");

        assert_eq!(patch.preferred_provider, Some(PreferredProvider::Local));
        assert_eq!(patch.latency_threshold_ms, Some(250));
        assert!(!patch.is_empty());
        assert!(PolicyPatch::default().is_empty());
    }
}
