//! Orchestrator configuration, reports and events.

use std::time::Duration;

use rand::Rng;

use crate::credential::Credential;
use crate::session::SessionConfig;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Spacing between consecutive joins: `base` plus up to `jitter` extra.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinPacing {
    pub base: Duration,
    pub jitter: Duration,
}

impl Default for JoinPacing {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(900),
            jitter: Duration::from_millis(800),
        }
    }
}

impl JoinPacing {
    pub fn next_delay(&self) -> Duration {
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.base + Duration::from_millis(extra)
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    pub session: SessionConfig,
    pub pacing: JoinPacing,
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Result of a full join sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinReport {
    pub succeeded: usize,
    pub total: usize,
}

/// Result of a settings broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// There was nothing to broadcast to.
    NoLiveSessions,
    Dispatched {
        succeeded: usize,
        failed: usize,
        /// Sessions that stored the settings without sending (not active yet).
        skipped: usize,
    },
}

impl BroadcastOutcome {
    pub fn succeeded(&self) -> usize {
        match self {
            BroadcastOutcome::NoLiveSessions => 0,
            BroadcastOutcome::Dispatched { succeeded, .. } => *succeeded,
        }
    }

    pub fn failed(&self) -> usize {
        match self {
            BroadcastOutcome::NoLiveSessions => 0,
            BroadcastOutcome::Dispatched { failed, .. } => *failed,
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events emitted by the orchestrator for the caller to present.
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    CredentialAdded {
        credential: Credential,
    },
    NameResolved {
        credential: Credential,
        display_name: String,
    },
    CredentialRemoved {
        credential: Credential,
    },
    SessionJoined {
        credential: Credential,
        display_name: String,
    },
    SessionFailed {
        credential: Credential,
        display_name: String,
        error: String,
    },
    Progress {
        current: usize,
        total: usize,
    },
    SettingsBroadcast {
        succeeded: usize,
        failed: usize,
    },
    LeftAll {
        count: usize,
    },
}
