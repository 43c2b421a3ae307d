pub mod errors;
pub mod id;

pub use errors::{ChorusError, ConfigError};
pub use id::SessionId;
