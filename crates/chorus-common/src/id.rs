use serde::{Deserialize, Serialize};
use std::fmt;

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Identifies one gateway session attempt in logs and events.
///
/// Only the first eight hex digits are shown by `Display`, which is enough
/// to tell concurrent sessions apart in a log stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(new_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short())
    }
}
