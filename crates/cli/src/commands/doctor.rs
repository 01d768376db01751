use harvest_core::config::{AppConfig, LoadOptions};
use harvest_providers::LocalProviderManager;
use secrecy::ExposeSecret;
use serde::Serialize;

use crate::commands::build_runtime;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_local_provider(&config));
            checks.push(check_cloud_credentials(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(skipped("local_provider_readiness"));
            checks.push(skipped("cloud_credentials"));
        }
    }

    // Skipped checks belong to disabled providers and do not fail the run.
    let healthy = checks.iter().all(|check| check.status != CheckStatus::Fail);
    let overall_status = if healthy { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if healthy {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn skipped(name: &'static str) -> DoctorCheck {
    DoctorCheck {
        name,
        status: CheckStatus::Skipped,
        details: "skipped because configuration did not load".to_string(),
    }
}

fn check_local_provider(config: &AppConfig) -> DoctorCheck {
    const NAME: &str = "local_provider_readiness";

    let Some(spec) = config.routing_policy().local_provider else {
        return DoctorCheck {
            name: NAME,
            status: CheckStatus::Skipped,
            details: "local provider disabled".to_string(),
        };
    };
    let manager = match LocalProviderManager::from_config(&config.probe) {
        Ok(manager) => manager,
        Err(error) => {
            return DoctorCheck { name: NAME, status: CheckStatus::Fail, details: error.to_string() }
        }
    };
    let runtime = match build_runtime("doctor") {
        Ok(runtime) => runtime,
        Err(_) => {
            return DoctorCheck {
                name: NAME,
                status: CheckStatus::Fail,
                details: "failed to initialize async runtime".to_string(),
            };
        }
    };

    let report = runtime.block_on(manager.validate_config(&spec));
    let mut details = if report.valid {
        format!("{} reachable at {}", spec.provider, spec.endpoint.as_deref().unwrap_or("<default>"))
    } else {
        report.issues.join("; ")
    };
    if !report.suggestions.is_empty() {
        details.push_str(&format!(" (hint: {})", report.suggestions.join("; ")));
    }

    let status = if report.valid { CheckStatus::Pass } else { CheckStatus::Fail };
    DoctorCheck { name: NAME, status, details }
}

fn check_cloud_credentials(config: &AppConfig) -> DoctorCheck {
    const NAME: &str = "cloud_credentials";

    if !config.cloud_provider.enabled {
        return DoctorCheck {
            name: NAME,
            status: CheckStatus::Skipped,
            details: "cloud provider disabled".to_string(),
        };
    }
    match config.cloud_provider.api_key.as_ref() {
        Some(key) if !key.expose_secret().trim().is_empty() => DoctorCheck {
            name: NAME,
            status: CheckStatus::Pass,
            details: format!("api key present for `{}`", config.cloud_provider.provider),
        },
        _ => DoctorCheck {
            name: NAME,
            status: CheckStatus::Fail,
            details: format!("no api key configured for `{}`", config.cloud_provider.provider),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
