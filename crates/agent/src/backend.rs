//! Inference backends that serve routed operations.
//!
//! Backends are opaque clients: the router only needs to know whether the
//! dispatch succeeded and what it cost.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::debug;

use harvest_core::costs::{estimate_cost, estimate_tokens};
use harvest_core::domain::provider::ProviderSpec;
use harvest_core::errors::StageError;
use harvest_core::routing::{OperationKind, ProviderSelection};

#[derive(Clone, Debug, PartialEq)]
pub struct InferenceRequest {
    pub operation: OperationKind,
    pub spec: ProviderSpec,
    pub correlation_id: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl InferenceRequest {
    pub fn for_selection(selection: &ProviderSelection, correlation_id: &str, input: &str) -> Self {
        let budget = match selection.operation {
            OperationKind::Classification => 16,
            OperationKind::Extraction => 64,
            OperationKind::Generation => 256,
        };
        let output_tokens = selection.spec.max_tokens.map(|limit| limit.min(budget)).unwrap_or(budget);
        Self {
            operation: selection.operation,
            spec: selection.spec.clone(),
            correlation_id: correlation_id.to_string(),
            input_tokens: estimate_tokens(input),
            output_tokens,
        }
    }
}

#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Serves one request and returns its cost. An unreachable provider is
    /// reported as [`StageError::ProviderUnavailable`].
    async fn dispatch(&self, request: &InferenceRequest) -> Result<Decimal, StageError>;
}

/// Accounts the cost a real provider would charge without any network I/O.
#[derive(Clone, Debug, Default)]
pub struct SimulatedBackend;

#[async_trait]
impl InferenceBackend for SimulatedBackend {
    async fn dispatch(&self, request: &InferenceRequest) -> Result<Decimal, StageError> {
        let cost = estimate_cost(&request.spec, request.input_tokens, request.output_tokens);
        debug!(
            event_name = "backend.simulated.dispatch",
            correlation_id = %request.correlation_id,
            provider = %request.spec.provider,
            operation = %request.operation,
            cost = %cost,
            "simulated inference dispatch"
        );
        Ok(cost)
    }
}

/// Backends keyed by provider name, with a default for unregistered names.
#[derive(Clone)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn InferenceBackend>>,
    default_backend: Arc<dyn InferenceBackend>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new(Arc::new(SimulatedBackend))
    }
}

impl BackendRegistry {
    pub fn new(default_backend: Arc<dyn InferenceBackend>) -> Self {
        Self { backends: HashMap::new(), default_backend }
    }

    pub fn register(&mut self, provider: impl Into<String>, backend: Arc<dyn InferenceBackend>) {
        self.backends.insert(provider.into(), backend);
    }

    pub fn with_backend(mut self, provider: impl Into<String>, backend: Arc<dyn InferenceBackend>) -> Self {
        self.register(provider, backend);
        self
    }

    pub fn resolve(&self, provider: &str) -> Arc<dyn InferenceBackend> {
        self.backends.get(provider).cloned().unwrap_or_else(|| Arc::clone(&self.default_backend))
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
