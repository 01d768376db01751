use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use harvest_core::domain::provider::ProviderSpec;
use harvest_providers::LocalProviderManager;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    pub providers: Arc<LocalProviderManager>,
    pub local_provider: Option<ProviderSpec>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub local_provider: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// Degraded when the configured local provider fails validation. Requests are
/// still served in that state because the router falls back per stage.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let local_provider = local_provider_check(&state).await;
    let ready = local_provider.status != "degraded";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "harvest-server runtime initialized".to_string(),
        },
        local_provider,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn local_provider_check(state: &HealthState) -> HealthCheck {
    let Some(spec) = state.local_provider.as_ref() else {
        return HealthCheck { status: "skipped", detail: "local provider disabled".to_string() };
    };

    let report = state.providers.validate_config(spec).await;
    if report.valid {
        HealthCheck { status: "ready", detail: format!("{} is reachable", spec.provider) }
    } else {
        HealthCheck { status: "degraded", detail: report.issues.join("; ") }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{extract::State, http::StatusCode, Json};
    use harvest_core::domain::provider::ProviderSpec;
    use harvest_providers::{LocalProviderManager, ProbeResponse, ProviderError, ServiceProbe};

    use crate::health::{health, HealthState};

    struct FixedProbe(Option<u16>);

    #[async_trait]
    impl ServiceProbe for FixedProbe {
        async fn get(&self, url: &str) -> Result<ProbeResponse, ProviderError> {
            match self.0 {
                Some(status) => Ok(ProbeResponse {
                    status,
                    body: r#"{"models":[{"name":"llama3.1:8b"}]}"#.to_string(),
                }),
                None => Err(ProviderError::Probe {
                    url: url.to_string(),
                    reason: "connection refused".to_string(),
                }),
            }
        }
    }

    fn state(probe: FixedProbe, local_provider: Option<ProviderSpec>) -> State<HealthState> {
        State(HealthState { providers: Arc::new(LocalProviderManager::new(Arc::new(probe))), local_provider })
    }

    fn ollama() -> ProviderSpec {
        ProviderSpec::new("ollama").with_endpoint("http://localhost:11434").with_model("llama3.1:8b")
    }

    #[tokio::test]
    async fn health_returns_ready_when_local_provider_is_reachable() {
        let (status, Json(payload)) = health(state(FixedProbe(Some(200)), Some(ollama()))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.local_provider.status, "ready");
        assert_eq!(payload.service.status, "ready");
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_local_provider_is_down() {
        let (status, Json(payload)) = health(state(FixedProbe(None), Some(ollama()))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.local_provider.detail, "Cannot connect to local AI service");
        assert_eq!(payload.service.status, "ready");
    }

    #[tokio::test]
    async fn health_skips_disabled_local_provider() {
        let (status, Json(payload)) = health(state(FixedProbe(None), None)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.local_provider.status, "skipped");
    }
}
