//! JSON API over the routing pipeline.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use harvest_agent::NlpRouter;
use harvest_core::domain::context::{BusinessContext, ConversationContext};
use harvest_core::domain::intent::{ClassificationResult, ExtractionResult};
use harvest_core::domain::provider::RoutingPolicy;
use harvest_core::domain::response::{GenerationOptions, ProcessedMessage};
use harvest_core::errors::InterfaceError;
use harvest_core::metrics::{Metrics, ThresholdReport};
use harvest_core::routing::PolicyPatch;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ApiState {
    pub router: Arc<NlpRouter>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: String,
    #[serde(default)]
    pub context: ConversationContext,
    #[serde(default)]
    pub business: BusinessContext,
    #[serde(default)]
    pub options: GenerationOptions,
}

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub message: String,
    #[serde(default)]
    pub context: ConversationContext,
}

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub metrics: Metrics,
    pub thresholds: ThresholdReport,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: &'static str,
    pub detail: String,
    pub correlation_id: String,
}

/// [`InterfaceError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let detail = match &self.0 {
            InterfaceError::BadRequest { message, .. } => message.clone(),
            _ => String::new(),
        };
        let body = ApiErrorBody {
            error: self.0.user_message(),
            detail,
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/v1/messages", post(process_message))
        .route("/v1/classify", post(classify))
        .route("/v1/extract", post(extract))
        .route("/v1/metrics", get(metrics).delete(reset_metrics))
        .route("/v1/config", patch(update_config))
        .with_state(state)
}

pub async fn process_message(
    State(state): State<ApiState>,
    Json(request): Json<MessageRequest>,
) -> Json<ProcessedMessage> {
    let processed = state
        .router
        .process_message_with(&request.message, &request.context, &request.business, &request.options)
        .await;
    Json(processed)
}

pub async fn classify(
    State(state): State<ApiState>,
    Json(request): Json<ClassifyRequest>,
) -> Json<ClassificationResult> {
    Json(state.router.classify_intent(&request.message, &request.context).await)
}

pub async fn extract(
    State(state): State<ApiState>,
    Json(request): Json<ExtractRequest>,
) -> Json<ExtractionResult> {
    Json(state.router.extract_entities(&request.message).await)
}

pub async fn metrics(State(state): State<ApiState>) -> Json<MetricsResponse> {
    Json(MetricsResponse { metrics: state.router.metrics(), thresholds: state.router.threshold_report() })
}

pub async fn reset_metrics(State(state): State<ApiState>) -> StatusCode {
    state.router.reset_metrics();
    StatusCode::NO_CONTENT
}

pub async fn update_config(
    State(state): State<ApiState>,
    Json(patch): Json<PolicyPatch>,
) -> Result<Json<RoutingPolicy>, ApiError> {
    let correlation_id = new_correlation_id();
    match state.router.update_config(patch) {
        Ok(()) => {
            info!(
                event_name = "api.config.updated",
                correlation_id = %correlation_id,
                "routing policy replaced"
            );
            Ok(Json(state.router.policy().as_ref().clone()))
        }
        Err(error) => {
            warn!(
                event_name = "api.config.rejected",
                correlation_id = %correlation_id,
                error = %error,
                "routing policy update rejected"
            );
            Err(ApiError(error.into_interface(correlation_id)))
        }
    }
}

fn new_correlation_id() -> String {
    format!("req-{}", Uuid::new_v4().simple())
}
