use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use harvest_cli::commands::{classify, detect, doctor, process, setup};
use serde_json::Value;

#[test]
fn classify_returns_greeting_with_default_config() {
    with_env(&[("HARVEST_LOCAL_PROVIDER_ENABLED", "false")], || {
        let result = classify::run("Hello there!");
        assert_eq!(result.exit_code, 0, "expected successful classification");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "classify");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["data"]["intent"], "greeting");
        assert_eq!(payload["data"]["recognized"], true);
        assert_eq!(payload["data"]["provider"], "simulated");
    });
}

#[test]
fn classify_reports_config_failure() {
    with_env(&[("HARVEST_CLOUD_PROVIDER_ENABLED", "true")], || {
        let result = classify::run("Hello there!");
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn process_quotes_prices_from_inventory_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("shop.json");
    fs::write(
        &path,
        r#"[{"id":"veg-tomato","name":"Tomatoes","category":"Vegetables","unit":"kg","unit_price":"5.99","stock_quantity":"40"}]"#,
    )
    .expect("write inventory");

    with_env(&[], || {
        let result = process::run("How much for 2 kg of tomatoes?", Some(&path));
        assert_eq!(result.exit_code, 0, "expected successful processing: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["processed"]["intent"]["name"], "price_inquiry");
        let text = payload["message"].as_str().unwrap_or_default();
        assert!(text.contains("11.98"), "unexpected response: {text}");
        assert_eq!(payload["data"]["metrics"]["total_requests"], 1);
    });
}

#[test]
fn process_rejects_unreadable_inventory() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("missing.json");

    with_env(&[], || {
        let result = process::run("hello", Some(&path));
        assert_eq!(result.exit_code, 3);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "invalid_input");
    });
}

#[test]
fn setup_renders_instructions_for_gpu_tier() {
    with_env(&[], || {
        let result = setup::run(Some("lmstudio"), Some("RTX 4090 24GB"));
        assert_eq!(result.exit_code, 0);
        assert!(result.output.starts_with("recommended tier: performance"));
        assert!(result.output.contains("LM Studio setup"));
        assert!(result.output.contains("qwen2.5-32b-instruct"));
    });
}

#[test]
fn setup_rejects_unknown_provider() {
    with_env(&[], || {
        let result = setup::run(Some("vllm"), None);
        assert_eq!(result.exit_code, 3);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "unknown_provider");
    });
}

#[test]
fn detect_reports_unreachable_services_as_absent() {
    with_env(
        &[("HARVEST_PROBE_TIMEOUT_MS", "200")],
        || {
            let result = detect::run();
            assert_eq!(result.exit_code, 0);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "detect");
            assert!(payload["data"]["ollama"].is_boolean());
            assert!(payload["data"]["lmstudio"].is_boolean());
        },
    );
}

#[test]
fn doctor_json_skips_disabled_providers() {
    with_env(&[("HARVEST_LOCAL_PROVIDER_ENABLED", "false")], || {
        let output = doctor::run(true);
        let payload = parse_payload(&output);

        assert_eq!(payload["overall_status"], "pass");
        let checks = payload["checks"].as_array().cloned().unwrap_or_default();
        assert_eq!(checks.len(), 3);
        assert_eq!(checks[0]["name"], "config_validation");
        assert_eq!(checks[1]["status"], "skipped");
        assert_eq!(checks[2]["status"], "skipped");
    });
}

#[test]
fn doctor_flags_missing_cloud_key() {
    with_env(
        &[
            ("HARVEST_LOCAL_PROVIDER_ENABLED", "false"),
            ("HARVEST_CLOUD_PROVIDER_ENABLED", "true"),
        ],
        || {
            let output = doctor::run(false);
            assert!(output.starts_with("doctor: one or more readiness checks failed"));
            assert!(output.contains("- [fail] config_validation:"));
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "HARVEST_ROUTING_PREFERRED_PROVIDER",
        "HARVEST_ROUTING_FALLBACK_PROVIDER",
        "HARVEST_ROUTING_COST_THRESHOLD",
        "HARVEST_ROUTING_LATENCY_THRESHOLD_MS",
        "HARVEST_LOCAL_PROVIDER_ENABLED",
        "HARVEST_LOCAL_PROVIDER_PROVIDER",
        "HARVEST_LOCAL_PROVIDER_ENDPOINT",
        "HARVEST_LOCAL_PROVIDER_MODEL",
        "HARVEST_LOCAL_PROVIDER_MAX_TOKENS",
        "HARVEST_LOCAL_PROVIDER_TEMPERATURE",
        "HARVEST_CLOUD_PROVIDER_ENABLED",
        "HARVEST_CLOUD_PROVIDER_PROVIDER",
        "HARVEST_CLOUD_PROVIDER_ENDPOINT",
        "HARVEST_CLOUD_PROVIDER_MODEL",
        "HARVEST_CLOUD_PROVIDER_REGION",
        "HARVEST_CLOUD_PROVIDER_API_KEY",
        "HARVEST_PROBE_TIMEOUT_MS",
        "HARVEST_SERVER_BIND_ADDRESS",
        "HARVEST_SERVER_PORT",
        "HARVEST_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "HARVEST_LOGGING_LEVEL",
        "HARVEST_LOGGING_FORMAT",
        "HARVEST_LOG_LEVEL",
        "HARVEST_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
