use harvest_providers::{LocalProviderManager, ProviderError};

use crate::commands::{load_config, CommandResult, EXIT_INPUT, EXIT_PROVIDER};

pub fn run(provider: Option<&str>, gpu_hint: Option<&str>) -> CommandResult {
    let config = match load_config("setup") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let manager = match LocalProviderManager::from_config(&config.probe) {
        Ok(manager) => manager,
        Err(error) => {
            return CommandResult::failure("setup", "provider_setup", error.to_string(), EXIT_PROVIDER)
        }
    };

    let recommended = manager.recommended_setup(gpu_hint);
    let instructions = match manager.setup_instructions_for_tier(provider, recommended.tier) {
        Ok(instructions) => instructions,
        Err(error @ ProviderError::UnknownProvider(_)) => {
            return CommandResult::failure("setup", "unknown_provider", error.to_string(), EXIT_INPUT)
        }
        Err(error) => {
            return CommandResult::failure("setup", "provider_setup", error.to_string(), EXIT_PROVIDER)
        }
    };

    let mut lines = vec![format!(
        "recommended tier: {} (gpu hint: {})",
        recommended.tier.as_str(),
        gpu_hint.unwrap_or("<none>")
    )];
    lines.push(String::new());
    lines.push(instructions.trim_end().to_string());

    CommandResult { exit_code: 0, output: lines.join("\n") }
}
