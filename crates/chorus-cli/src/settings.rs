//! Translate the loaded config into orchestrator settings and the log filter.

use std::sync::Arc;
use std::time::Duration;

use chorus_config::schema::LogLevel;
use chorus_config::ChorusConfig;
use chorus_gateway::{
    ClientProperties, DirectoryLookup, HttpDirectory, JoinPacing, NoDirectory, OrchestratorConfig,
    SessionConfig,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "chorus=info";

pub fn orchestrator_config(config: &ChorusConfig) -> OrchestratorConfig {
    let gateway = &config.gateway;
    OrchestratorConfig {
        session: SessionConfig {
            gateway_url: gateway.url.clone(),
            connect_timeout: Duration::from_secs(u64::from(gateway.connect_timeout_secs)),
            settle_delay: Duration::from_millis(u64::from(gateway.settle_delay_ms)),
            leave_grace: Duration::from_millis(u64::from(gateway.leave_grace_ms)),
            properties: ClientProperties {
                os: config.client.os.clone(),
                browser: config.client.browser.clone(),
                device: config.client.device.clone(),
            },
        },
        pacing: JoinPacing {
            base: Duration::from_millis(u64::from(config.join.base_delay_ms)),
            jitter: Duration::from_millis(u64::from(config.join.jitter_ms)),
        },
    }
}

/// The configured directory, or none when disabled or it cannot be built.
pub fn directory(config: &ChorusConfig, no_lookup: bool) -> Arc<dyn DirectoryLookup> {
    let directory = &config.directory;
    if no_lookup || !directory.enabled {
        return Arc::new(NoDirectory);
    }
    let timeout = Duration::from_secs(u64::from(directory.timeout_secs));
    match HttpDirectory::new(directory.url.clone(), timeout) {
        Ok(http) => Arc::new(http),
        Err(e) => {
            warn!(error = %e, "Directory client unavailable, names will not resolve");
            Arc::new(NoDirectory)
        }
    }
}

/// Filter directive for a `--log-level` or config level value.
///
/// A bare level applies to the chorus crates; anything containing `=` is
/// passed through as a full directive.
pub fn log_directive(level: &str) -> String {
    if level.contains('=') {
        level.to_string()
    } else {
        format!("chorus={level}")
    }
}

/// `--log-level` wins over the config file's level; both fall back to `chorus=info`.
pub fn resolve_directive(cli_level: Option<&str>, config_level: Option<LogLevel>) -> String {
    cli_level
        .map(log_directive)
        .or_else(|| config_level.map(|level| log_directive(level.as_directive())))
        .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string())
}

/// `RUST_LOG` when set, otherwise `directive`.
pub fn env_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
    })
}
