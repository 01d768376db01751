use harvest_providers::LocalProviderManager;

use crate::commands::{build_runtime, load_config, CommandResult, EXIT_PROVIDER};

pub fn run() -> CommandResult {
    let config = match load_config("detect") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let manager = match LocalProviderManager::from_config(&config.probe) {
        Ok(manager) => manager,
        Err(error) => {
            return CommandResult::failure("detect", "provider_setup", error.to_string(), EXIT_PROVIDER)
        }
    };
    let runtime = match build_runtime("detect") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let report = runtime.block_on(manager.detect_available_services());
    let message = if report.endpoints.is_empty() {
        "no local inference services detected".to_string()
    } else {
        let names: Vec<&str> = report.endpoints.keys().map(String::as_str).collect();
        format!("detected: {}", names.join(", "))
    };
    CommandResult::success_with_data("detect", message, report)
}
