//! Full configuration validation.
//!
//! Validates numeric ranges and the gateway URL scheme, collecting every
//! problem into a single `ConfigError`.

mod helpers;


use crate::schema::ChorusConfig;
use chorus_common::ConfigError;

use helpers::validate_range;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &ChorusConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_gateway(&mut errors, config);
    validate_join(&mut errors, config);
    validate_directory(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_gateway(errors: &mut Vec<String>, config: &ChorusConfig) {
    let gateway = &config.gateway;
    if !(gateway.url.starts_with("wss://") || gateway.url.starts_with("ws://")) {
        errors.push(format!(
            "gateway.url = {:?} must start with ws:// or wss://",
            gateway.url
        ));
    }
    validate_range(
        errors,
        "gateway.connect_timeout_secs",
        gateway.connect_timeout_secs,
        1,
        120,
    );
    validate_range(errors, "gateway.settle_delay_ms", gateway.settle_delay_ms, 0, 10_000);
    validate_range(errors, "gateway.leave_grace_ms", gateway.leave_grace_ms, 0, 5_000);
}

fn validate_join(errors: &mut Vec<String>, config: &ChorusConfig) {
    validate_range(errors, "join.base_delay_ms", config.join.base_delay_ms, 0, 60_000);
    validate_range(errors, "join.jitter_ms", config.join.jitter_ms, 0, 60_000);
}

fn validate_directory(errors: &mut Vec<String>, config: &ChorusConfig) {
    if config.directory.enabled {
        validate_range(
            errors,
            "directory.timeout_secs",
            config.directory.timeout_secs,
            1,
            60,
        );
    }
}
