//! Log orchestrator events as they arrive.

use chorus_gateway::OrchestratorEvent;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

pub async fn log_events(mut events: UnboundedReceiver<OrchestratorEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            OrchestratorEvent::CredentialAdded { credential } => {
                debug!(credential = %credential, "Credential added");
            }
            OrchestratorEvent::NameResolved {
                credential,
                display_name,
            } => info!(credential = %credential, name = %display_name, "Account identified"),
            OrchestratorEvent::CredentialRemoved { credential } => {
                info!(credential = %credential, "Credential removed");
            }
            OrchestratorEvent::SessionJoined {
                credential,
                display_name,
            } => info!(credential = %credential, name = %display_name, "In channel"),
            OrchestratorEvent::SessionFailed {
                credential,
                display_name,
                error,
            } => warn!(credential = %credential, name = %display_name, error = %error, "Could not join"),
            OrchestratorEvent::Progress { current, total } => {
                info!("Join progress {current}/{total}");
            }
            OrchestratorEvent::SettingsBroadcast { succeeded, failed } => {
                debug!(succeeded, failed, "Settings applied");
            }
            OrchestratorEvent::LeftAll { count } => debug!(count, "Left channel"),
        }
    }
}
