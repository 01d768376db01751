//! Operational metrics for router operations.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::provider::RoutingPolicy;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn from_success(success: bool) -> Self {
        if success {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

/// Point-in-time copy of the collector state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub average_latency_ms: f64,
    pub total_cost: Decimal,
    pub provider_usage: BTreeMap<String, u64>,
}

impl Metrics {
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.successful_requests as f64 / self.total_requests as f64
    }
}

/// Advisory comparison of a metrics snapshot against policy thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThresholdReport {
    pub cost_threshold: Option<Decimal>,
    pub latency_threshold_ms: Option<u64>,
    pub total_cost: Decimal,
    pub average_latency_ms: f64,
    pub cost_exceeded: bool,
    pub latency_exceeded: bool,
}

impl ThresholdReport {
    pub fn evaluate(metrics: &Metrics, policy: &RoutingPolicy) -> Self {
        let cost_exceeded =
            policy.cost_threshold.map(|threshold| metrics.total_cost > threshold).unwrap_or(false);
        let latency_exceeded = policy
            .latency_threshold_ms
            .map(|threshold| metrics.total_requests > 0 && metrics.average_latency_ms > threshold as f64)
            .unwrap_or(false);

        Self {
            cost_threshold: policy.cost_threshold,
            latency_threshold_ms: policy.latency_threshold_ms,
            total_cost: metrics.total_cost,
            average_latency_ms: metrics.average_latency_ms,
            cost_exceeded,
            latency_exceeded,
        }
    }

    pub fn any_exceeded(&self) -> bool {
        self.cost_exceeded || self.latency_exceeded
    }
}

#[derive(Debug, Default)]
struct MetricsState {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    total_latency_ms: u128,
    total_cost: Decimal,
    provider_usage: BTreeMap<String, u64>,
}

impl MetricsState {
    fn snapshot(&self) -> Metrics {
        let average_latency_ms = if self.total_requests == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.total_requests as f64
        };
        Metrics {
            total_requests: self.total_requests,
            successful_requests: self.successful_requests,
            failed_requests: self.failed_requests,
            average_latency_ms,
            total_cost: self.total_cost,
            provider_usage: self.provider_usage.clone(),
        }
    }
}

/// Mutex-guarded accumulator. Each `record` call is applied atomically with
/// respect to `snapshot` and `reset`.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    state: Mutex<MetricsState>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: Outcome, latency_ms: u64, cost: Decimal, provider: &str) {
        let mut state = self.lock();
        state.total_requests += 1;
        match outcome {
            Outcome::Success => state.successful_requests += 1,
            Outcome::Failure => state.failed_requests += 1,
        }
        state.total_latency_ms += u128::from(latency_ms);
        if !cost.is_zero() {
            state.total_cost += cost;
        }
        *state.provider_usage.entry(provider.to_string()).or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> Metrics {
        self.lock().snapshot()
    }

    pub fn reset(&self) {
        *self.lock() = MetricsState::default();
    }

    pub fn threshold_report(&self, policy: &RoutingPolicy) -> ThresholdReport {
        ThresholdReport::evaluate(&self.snapshot(), policy)
    }

    fn lock(&self) -> MutexGuard<'_, MetricsState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
