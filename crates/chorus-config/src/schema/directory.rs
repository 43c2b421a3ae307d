//! Display-name lookup configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub enabled: bool,
    pub url: String,
    /// Request timeout in seconds (valid range: 1-60).
    pub timeout_secs: u32,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "https://discord.com/api/v9/users/@me".into(),
            timeout_secs: 10,
        }
    }
}
