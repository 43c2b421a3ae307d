//! Gateway connection timing and join pacing.

use serde::{Deserialize, Serialize};

/// Gateway endpoint and per-session timings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub url: String,
    /// Seconds to wait for the hello frame (valid range: 1-120).
    pub connect_timeout_secs: u32,
    /// Delay between identify and the first voice-state frame (valid range: 0-10000).
    pub settle_delay_ms: u32,
    /// Delay between the leave frame and closing the socket (valid range: 0-5000).
    pub leave_grace_ms: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: "wss://gateway.discord.gg/?v=9&encoding=json".into(),
            connect_timeout_secs: 15,
            settle_delay_ms: 1500,
            leave_grace_ms: 300,
        }
    }
}

/// Spacing between sequential joins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinConfig {
    pub base_delay_ms: u32,
    /// Upper bound of the random extra delay added to `base_delay_ms`.
    pub jitter_ms: u32,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 900,
            jitter_ms: 800,
        }
    }
}
