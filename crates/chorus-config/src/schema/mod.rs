//! Configuration schema types for Chorus.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod client;
mod directory;
mod gateway;
mod system;

pub use client::*;
pub use directory::*;
pub use gateway::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Root configuration for Chorus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct ChorusConfig {
    pub gateway: GatewayConfig,
    pub join: JoinConfig,
    pub client: ClientConfig,
    pub directory: DirectoryConfig,
    pub logging: LoggingConfig,
}
