//! Session configuration, lifecycle states and outcomes.

use std::time::Duration;

use crate::protocol::ClientProperties;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Timing and endpoint settings shared by every session of an orchestrator.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub gateway_url: String,
    /// Upper bound for opening the socket and receiving hello.
    pub connect_timeout: Duration,
    /// Pause between identify and the first voice-state frame.
    pub settle_delay: Duration,
    /// Pause between the leave frame and closing the socket.
    pub leave_grace: Duration,
    pub properties: ClientProperties,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            gateway_url: "wss://gateway.discord.gg/?v=9&encoding=json".to_string(),
            connect_timeout: Duration::from_secs(15),
            settle_delay: Duration::from_millis(1500),
            leave_grace: Duration::from_millis(300),
            properties: ClientProperties::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Lifecycle of a gateway session.
///
/// `Connecting -> Identifying -> AwaitingReady -> Active -> Leaving -> Closed`,
/// with `Failed` reachable from any state before `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Connecting,
    Identifying,
    AwaitingReady,
    Active,
    Leaving,
    Closed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }

    /// States in which a session belongs in the orchestrator's live map.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            SessionState::Connecting
                | SessionState::Identifying
                | SessionState::AwaitingReady
                | SessionState::Active
        )
    }

    /// State after the transport goes away without the caller asking.
    pub(crate) fn after_transport_lost(self) -> Self {
        match self {
            SessionState::Connecting | SessionState::Identifying | SessionState::AwaitingReady => {
                SessionState::Failed
            }
            SessionState::Active | SessionState::Leaving => SessionState::Closed,
            terminal => terminal,
        }
    }
}

/// What `update_settings` did with the merged options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsDelivery {
    /// A voice-state frame was written to the socket.
    Sent,
    /// The session is not active; options were stored but nothing was sent.
    Skipped,
}
