use std::fs;
use std::path::Path;

use anyhow::Context;
use harvest_agent::NlpRouter;
use harvest_core::domain::context::BusinessContext;
use serde_json::json;

use crate::commands::{build_runtime, load_config, CommandResult, EXIT_INPUT};

pub fn run(message: &str, inventory: Option<&Path>) -> CommandResult {
    let config = match load_config("process") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let business = match inventory.map(load_business).transpose() {
        Ok(business) => business.unwrap_or_default(),
        Err(error) => {
            return CommandResult::failure("process", "invalid_input", format!("{error:#}"), EXIT_INPUT)
        }
    };
    let runtime = match build_runtime("process") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let router = NlpRouter::new(config.routing_policy());
    let processed =
        runtime.block_on(router.process_message(message, &business.conversation, &business));

    CommandResult::success_with_data(
        "process",
        processed.response.text.clone(),
        json!({ "processed": processed, "metrics": router.metrics() }),
    )
}

/// Reads a business context file: either a full object or a bare inventory array.
pub fn load_business(path: &Path) -> anyhow::Result<BusinessContext> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read inventory file `{}`", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("inventory file `{}` is not valid JSON", path.display()))?;

    if value.is_array() {
        let inventory = serde_json::from_value(value)
            .with_context(|| format!("inventory array in `{}` is malformed", path.display()))?;
        return Ok(BusinessContext { inventory, ..BusinessContext::default() });
    }
    serde_json::from_value(value)
        .with_context(|| format!("business context in `{}` is malformed", path.display()))
}
