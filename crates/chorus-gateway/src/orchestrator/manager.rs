//! The orchestrator: credential registry, sequential joins and fan-out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::credential::Credential;
use crate::directory::DirectoryLookup;
use crate::presence::{PresenceOptions, PresencePatch, VoiceTarget};
use crate::session::{GatewaySession, SessionConfig, SettingsDelivery};
use crate::GatewayError;

use super::registry::CredentialRegistry;
use super::types::{BroadcastOutcome, JoinPacing, JoinReport, OrchestratorConfig, OrchestratorEvent};

/// Clears the join flag when a join sequence ends, however it ends.
struct JoinGuard<'a>(&'a AtomicBool);

impl<'a> JoinGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, GatewayError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| GatewayError::JoinInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for JoinGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns every credential and its live session.
///
/// The registry keeps insertion order, which is the join order. Live
/// sessions are only ever inserted by [`join_all`](Self::join_all) and
/// removed by [`leave_all`](Self::leave_all),
/// [`remove_credential`](Self::remove_credential) or pruning of sessions
/// the server has ended.
pub struct SessionOrchestrator {
    session_config: Arc<SessionConfig>,
    pacing: JoinPacing,
    directory: Arc<dyn DirectoryLookup>,
    registry: Arc<RwLock<CredentialRegistry>>,
    sessions: RwLock<HashMap<Credential, Arc<GatewaySession>>>,
    options: RwLock<PresenceOptions>,
    joining: AtomicBool,
    events: mpsc::UnboundedSender<OrchestratorEvent>,
}

impl SessionOrchestrator {
    /// Create an orchestrator and the receiving end of its event stream.
    pub fn new(
        config: OrchestratorConfig,
        directory: Arc<dyn DirectoryLookup>,
    ) -> (Self, mpsc::UnboundedReceiver<OrchestratorEvent>) {
        let (events, event_rx) = mpsc::unbounded_channel();
        let orchestrator = Self {
            session_config: Arc::new(config.session),
            pacing: config.pacing,
            directory,
            registry: Arc::new(RwLock::new(CredentialRegistry::default())),
            sessions: RwLock::new(HashMap::new()),
            options: RwLock::new(PresenceOptions::default()),
            joining: AtomicBool::new(false),
            events,
        };
        (orchestrator, event_rx)
    }

    fn emit(&self, event: OrchestratorEvent) {
        // Receiver may be gone.
        let _ = self.events.send(event);
    }

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    /// Validate and register a credential, then resolve its name in the background.
    pub async fn add_credential(&self, raw: &str) -> Result<Credential, GatewayError> {
        let credential = Credential::parse(raw)?;
        if !self.registry.write().await.insert(credential.clone()) {
            return Err(GatewayError::Duplicate);
        }
        debug!(credential = %credential, "Credential registered");
        self.emit(OrchestratorEvent::CredentialAdded {
            credential: credential.clone(),
        });

        let directory = Arc::clone(&self.directory);
        let registry = Arc::clone(&self.registry);
        let events = self.events.clone();
        let lookup = credential.clone();
        tokio::spawn(async move {
            let Some(name) = directory.lookup(&lookup).await else {
                debug!(credential = %lookup, "Display name unresolved");
                return;
            };
            if registry.write().await.set_name(&lookup, name.clone()) {
                debug!(credential = %lookup, name = %name, "Display name resolved");
                let _ = events.send(OrchestratorEvent::NameResolved {
                    credential: lookup,
                    display_name: name,
                });
            }
        });

        Ok(credential)
    }

    /// Forget a credential, disconnecting its live session if it has one.
    ///
    /// Returns whether the credential was registered. Removing an unknown
    /// credential is not an error.
    pub async fn remove_credential(&self, raw: &str) -> bool {
        let raw = raw.trim();
        // Lock order is registry, then sessions, as in `join_one`.
        let (removed, session) = {
            let mut registry = self.registry.write().await;
            let removed = registry.remove(raw);
            let session = self.sessions.write().await.remove(raw);
            (removed, session)
        };

        if let Some(session) = session {
            session.disconnect().await;
        }

        match removed {
            Some(credential) => {
                info!(credential = %credential, "Credential removed");
                self.emit(OrchestratorEvent::CredentialRemoved { credential });
                true
            }
            None => false,
        }
    }

    /// Registered credentials in join order.
    pub async fn credentials(&self) -> Vec<Credential> {
        self.registry.read().await.snapshot()
    }

    /// Resolved display name, or the fallback label while unresolved.
    pub async fn display_name(&self, credential: &Credential) -> String {
        self.registry.read().await.display_name(credential)
    }

    /// Presence options applied to new joins and last broadcast.
    pub async fn options(&self) -> PresenceOptions {
        *self.options.read().await
    }

    // -----------------------------------------------------------------------
    // Live sessions
    // -----------------------------------------------------------------------

    /// Live sessions, after dropping any the server has already ended.
    async fn live_sessions(&self) -> Vec<Arc<GatewaySession>> {
        let mut sessions = self.sessions.write().await;
        sessions.retain(|credential, session| {
            let keep = !session.state().is_terminal();
            if !keep {
                debug!(credential = %credential, state = ?session.state(), "Pruning ended session");
            }
            keep
        });
        sessions.values().cloned().collect()
    }

    pub async fn live_count(&self) -> usize {
        self.live_sessions().await.len()
    }

    pub async fn live_credentials(&self) -> Vec<Credential> {
        self.live_sessions()
            .await
            .iter()
            .map(|s| s.credential().clone())
            .collect()
    }

    /// The live session for a credential, if any.
    pub async fn session(&self, raw: &str) -> Option<Arc<GatewaySession>> {
        self.sessions
            .read()
            .await
            .get(raw.trim())
            .filter(|s| !s.state().is_terminal())
            .cloned()
    }

    // -----------------------------------------------------------------------
    // Join
    // -----------------------------------------------------------------------

    /// Connect every registered credential to the channel, one at a time.
    ///
    /// Failures are counted and reported as events but never stop the
    /// sequence. Between consecutive joins the orchestrator waits
    /// [`JoinPacing::next_delay`]; there is no wait after the last one.
    pub async fn join_all(
        &self,
        guild_id: &str,
        channel_id: &str,
        options: PresenceOptions,
    ) -> Result<JoinReport, GatewayError> {
        let target = VoiceTarget::new(guild_id, channel_id)?;
        let credentials = self.credentials().await;
        if credentials.is_empty() {
            return Err(GatewayError::NoCredentials);
        }
        let _guard = JoinGuard::acquire(&self.joining)?;

        *self.options.write().await = options;
        let total = credentials.len();
        let mut succeeded = 0;
        info!(
            guild = %target.guild_id,
            channel = %target.channel_id,
            total,
            "Joining voice channel"
        );

        for (index, credential) in credentials.into_iter().enumerate() {
            if self.join_one(&credential, &target).await {
                succeeded += 1;
            }

            let current = index + 1;
            self.emit(OrchestratorEvent::Progress { current, total });
            if current < total {
                tokio::time::sleep(self.pacing.next_delay()).await;
            }
        }

        info!(succeeded, total, "Join sequence finished");
        Ok(JoinReport { succeeded, total })
    }

    /// Connect one credential and register the session. Returns success.
    async fn join_one(&self, credential: &Credential, target: &VoiceTarget) -> bool {
        let display_name = self.display_name(credential).await;
        let still_registered = self.registry.read().await.contains(credential.expose());
        if !still_registered {
            debug!(credential = %credential, "Credential removed before its turn");
            self.emit(OrchestratorEvent::SessionFailed {
                credential: credential.clone(),
                display_name,
                error: "credential removed".to_string(),
            });
            return false;
        }

        let previous = self.sessions.write().await.remove(credential);
        if let Some(previous) = previous {
            debug!(credential = %credential, "Replacing existing session");
            previous.disconnect().await;
        }

        let options = *self.options.read().await;
        let session = Arc::new(GatewaySession::new(
            credential.clone(),
            target.clone(),
            options,
            Arc::clone(&self.session_config),
        ));

        let error = match session.connect().await {
            Ok(()) => {
                let registered = {
                    let registry = self.registry.read().await;
                    let registered = registry.contains(credential.expose());
                    if registered {
                        self.sessions
                            .write()
                            .await
                            .insert(credential.clone(), Arc::clone(&session));
                    }
                    registered
                };
                if registered {
                    info!(
                        session = %session.id(),
                        credential = %credential,
                        name = %display_name,
                        "Joined"
                    );
                    self.emit(OrchestratorEvent::SessionJoined {
                        credential: credential.clone(),
                        display_name,
                    });
                    return true;
                }
                session.disconnect().await;
                "credential removed during join".to_string()
            }
            Err(e) => e.to_string(),
        };

        warn!(credential = %credential, name = %display_name, error = %error, "Join failed");
        self.emit(OrchestratorEvent::SessionFailed {
            credential: credential.clone(),
            display_name,
            error,
        });
        false
    }

    // -----------------------------------------------------------------------
    // Broadcast and leave
    // -----------------------------------------------------------------------

    /// Apply `patch` to every live session at once.
    ///
    /// The patch is also merged into the orchestrator's options so later
    /// joins pick it up.
    pub async fn broadcast_settings(&self, patch: PresencePatch) -> BroadcastOutcome {
        {
            let mut options = self.options.write().await;
            patch.apply_to(&mut options);
        }

        let live = self.live_sessions().await;
        if live.is_empty() {
            info!("No live sessions to update");
            return BroadcastOutcome::NoLiveSessions;
        }

        let results = join_all(live.iter().map(|s| s.update_settings(patch))).await;

        let (mut succeeded, mut failed, mut skipped) = (0, 0, 0);
        for (session, result) in live.iter().zip(results) {
            match result {
                Ok(SettingsDelivery::Sent) => succeeded += 1,
                Ok(SettingsDelivery::Skipped) => skipped += 1,
                Err(e) => {
                    warn!(credential = %session.credential(), error = %e, "Settings update failed");
                    failed += 1;
                }
            }
        }

        info!(succeeded, failed, skipped, "Settings broadcast");
        self.emit(OrchestratorEvent::SettingsBroadcast { succeeded, failed });
        BroadcastOutcome::Dispatched {
            succeeded,
            failed,
            skipped,
        }
    }

    /// Disconnect every live session at once and clear the live set.
    ///
    /// The ids are only checked, as for [`join_all`](Self::join_all).
    /// Returns how many sessions were still live when asked to leave.
    pub async fn leave_all(&self, guild_id: &str, channel_id: &str) -> Result<usize, GatewayError> {
        VoiceTarget::new(guild_id, channel_id)?;

        let drained: Vec<Arc<GatewaySession>> = self
            .sessions
            .write()
            .await
            .drain()
            .map(|(_, session)| session)
            .collect();
        let count = drained
            .iter()
            .filter(|s| !s.state().is_terminal())
            .count();

        join_all(drained.iter().map(|s| s.disconnect())).await;

        info!(count, "Left voice channel");
        self.emit(OrchestratorEvent::LeftAll { count });
        Ok(count)
    }
}
