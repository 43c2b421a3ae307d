//! Chorus configuration system.
//!
//! TOML-based configuration for gateway timing, join pacing, identify
//! metadata, directory lookup and logging. All sections use sensible
//! defaults so partial configs work out of the box.

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::ChorusConfig;
pub use toml_loader::{load_default, load_from_path};

use chorus_common::ConfigError;
use std::path::Path;

/// Load config from the platform default path and validate it.
///
/// Creates a default `config.toml` in the OS config directory if none exists.
pub fn load_config() -> Result<ChorusConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

/// Load config from an explicit path and validate it.
pub fn load_config_from(path: &Path) -> Result<ChorusConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }
    let config = toml_loader::load_from_path(path)?;
    validation::validate(&config)?;
    Ok(config)
}
