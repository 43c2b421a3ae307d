//! Multi-credential voice presence over a real-time gateway.
//!
//! Each credential gets its own [`GatewaySession`]: a websocket that runs the
//! hello / identify / voice-state handshake and keeps itself alive with a
//! heartbeat task. The [`SessionOrchestrator`] owns the credential registry,
//! joins sessions one at a time with randomized spacing, and fans settings
//! changes and leave requests out to every live session.

pub mod credential;
pub mod directory;
pub mod orchestrator;
pub mod presence;
pub mod protocol;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

pub use credential::{validate, Credential};
pub use directory::{DirectoryLookup, HttpDirectory, NoDirectory};
pub use orchestrator::{
    BroadcastOutcome, JoinPacing, JoinReport, OrchestratorConfig, OrchestratorEvent,
    SessionOrchestrator,
};
pub use presence::{PresenceOptions, PresencePatch, VoiceTarget};
pub use protocol::{ClientProperties, GatewayFrame, VoiceStatePayload};
pub use session::{GatewaySession, SessionConfig, SessionState, SettingsDelivery};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid credential format")]
    InvalidFormat,
    #[error("credential already registered")]
    Duplicate,
    #[error("group id and channel id are required")]
    MissingTarget,
    #[error("no credentials registered")]
    NoCredentials,
    #[error("a join sequence is already running")]
    JoinInProgress,
    #[error("gateway timeout: no hello within {0:?}")]
    GatewayTimeout(Duration),
    #[error("connection error: {0}")]
    ConnectionError(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<GatewayError> for chorus_common::ChorusError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidFormat | GatewayError::Duplicate => {
                chorus_common::ChorusError::Credential(err.to_string())
            }
            other => chorus_common::ChorusError::Gateway(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_error_display() {
        assert_eq!(
            GatewayError::MissingTarget.to_string(),
            "group id and channel id are required"
        );
        assert_eq!(
            GatewayError::ConnectionError("refused".into()).to_string(),
            "connection error: refused"
        );
        assert!(GatewayError::GatewayTimeout(Duration::from_secs(15))
            .to_string()
            .contains("15s"));
    }

    #[test]
    fn gateway_error_into_chorus_error() {
        let err: chorus_common::ChorusError = GatewayError::Duplicate.into();
        assert!(matches!(err, chorus_common::ChorusError::Credential(_)));

        let err: chorus_common::ChorusError = GatewayError::NoCredentials.into();
        assert!(matches!(err, chorus_common::ChorusError::Gateway(_)));
        assert_eq!(err.to_string(), "gateway error: no credentials registered");
    }
}
