//! Client properties sent with identify.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.into(),
            browser: "chorus".into(),
            device: "chorus".into(),
        }
    }
}
