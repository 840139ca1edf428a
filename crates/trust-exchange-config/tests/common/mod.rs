// crates/trust-exchange-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for trust-exchange-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use trust_exchange_config::ConfigError;
use trust_exchange_config::TrustExchangeConfig;

/// Smallest config text that passes validation.
pub const MINIMAL_TOML: &str = r#"
[identity]
client_id = "REQUESTER-1"
signing_key_path = "keys/requester.key"

[broker]
base_url = "https://broker.example/api"
"#;

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<TrustExchangeConfig, ConfigError> {
    TrustExchangeConfig::from_toml_str(MINIMAL_TOML)
}

/// Asserts that `result` failed with a message containing `needle`.
pub fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> Result<(), String> {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}
