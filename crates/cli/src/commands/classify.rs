use harvest_agent::NlpRouter;
use harvest_core::domain::context::ConversationContext;
use harvest_core::routing::{select_provider, OperationKind};
use serde::Serialize;

use crate::commands::{build_runtime, load_config, CommandResult};

#[derive(Debug, Serialize)]
struct Classification {
    intent: String,
    confidence: f64,
    recognized: bool,
    provider: String,
}

pub fn run(message: &str) -> CommandResult {
    let config = match load_config("classify") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("classify") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let router = NlpRouter::new(config.routing_policy());
    let result = runtime.block_on(router.classify_intent(message, &ConversationContext::default()));
    let selection = select_provider(&router.policy(), OperationKind::Classification);

    let classification = Classification {
        intent: result.intent.name.to_string(),
        confidence: result.confidence,
        recognized: result.intent.is_recognized(),
        provider: selection.provider_name().to_string(),
    };
    CommandResult::success_with_data(
        "classify",
        format!("classified as {}", classification.intent),
        classification,
    )
}
