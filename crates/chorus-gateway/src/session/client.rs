//! Public handle for one credential's gateway session.

use std::sync::Arc;
use std::time::Duration;

use chorus_common::SessionId;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::credential::Credential;
use crate::presence::{PresenceOptions, PresencePatch, VoiceTarget};
use crate::protocol::{GatewayFrame, HelloPayload, VoiceStatePayload};
use crate::GatewayError;

use super::connection::{
    close_writer, heartbeat_task, open_gateway, reader_task, send_frame, wait_until_terminal,
    Sequence, SharedWriter, WsReader, WsWriter,
};
use super::types::{SessionConfig, SessionState, SettingsDelivery};

/// An open socket and the tasks that service it.
struct Link {
    writer: SharedWriter,
    heartbeat_interval: Duration,
    heartbeat: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl Link {
    fn stop_tasks(&self) {
        self.heartbeat.abort();
        self.reader.abort();
    }
}

/// One gateway connection for one credential.
///
/// All methods take `&self` so the orchestrator can drive many sessions
/// concurrently through shared handles. State only ever moves forward.
pub struct GatewaySession {
    id: SessionId,
    credential: Credential,
    target: VoiceTarget,
    config: Arc<SessionConfig>,
    options: Mutex<PresenceOptions>,
    state: Arc<watch::Sender<SessionState>>,
    sequence: Arc<Sequence>,
    link: Mutex<Option<Link>>,
}

impl GatewaySession {
    pub fn new(
        credential: Credential,
        target: VoiceTarget,
        options: PresenceOptions,
        config: Arc<SessionConfig>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Connecting);
        Self {
            id: SessionId::new(),
            credential,
            target,
            config,
            options: Mutex::new(options),
            state: Arc::new(state),
            sequence: Arc::new(Sequence::new()),
            link: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn target(&self) -> &VoiceTarget {
        &self.target
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub async fn options(&self) -> PresenceOptions {
        *self.options.lock().await
    }

    /// Heartbeat interval announced by the server, once hello has arrived.
    pub async fn heartbeat_interval(&self) -> Option<Duration> {
        self.link.lock().await.as_ref().map(|l| l.heartbeat_interval)
    }

    // -----------------------------------------------------------------------
    // Connect
    // -----------------------------------------------------------------------

    /// Run the handshake until the session is `Active`.
    ///
    /// Opening the socket and receiving hello are bounded by
    /// `connect_timeout`. Any failure before `Active` leaves the session
    /// `Failed` with its tasks stopped.
    pub async fn connect(&self) -> Result<(), GatewayError> {
        if self.state() != SessionState::Connecting {
            return Err(GatewayError::ConnectionError(format!(
                "session already used (state {:?})",
                self.state()
            )));
        }

        debug!(session = %self.id, credential = %self.credential, "Connecting to gateway");

        let timeout = self.config.connect_timeout;
        let opened = tokio::time::timeout(timeout, open_gateway(&self.config.gateway_url)).await;
        let result = match opened {
            Ok(Ok((writer, reader, hello))) => self.handshake(writer, reader, hello).await,
            Ok(Err(e)) => Err(e),
            Err(_elapsed) => Err(GatewayError::GatewayTimeout(timeout)),
        };

        if let Err(e) = &result {
            warn!(session = %self.id, credential = %self.credential, error = %e, "Gateway connect failed");
            self.fail().await;
        }
        result
    }

    async fn handshake(
        &self,
        writer: WsWriter,
        reader: WsReader,
        hello: HelloPayload,
    ) -> Result<(), GatewayError> {
        let heartbeat_interval = Duration::from_millis(hello.heartbeat_interval);
        self.advance(SessionState::Connecting, SessionState::Identifying)?;

        let writer = Arc::new(Mutex::new(writer));
        let heartbeat = tokio::spawn(heartbeat_task(
            Arc::clone(&writer),
            heartbeat_interval,
            Arc::clone(&self.sequence),
            self.state.subscribe(),
            self.id.clone(),
        ));
        let reader = tokio::spawn(reader_task(
            reader,
            Arc::clone(&writer),
            Arc::clone(&self.sequence),
            Arc::clone(&self.state),
            self.id.clone(),
        ));
        *self.link.lock().await = Some(Link {
            writer: Arc::clone(&writer),
            heartbeat_interval,
            heartbeat,
            reader,
        });

        let identify = GatewayFrame::identify(&self.credential, &self.config.properties)?;
        send_frame(&writer, &identify).await?;
        self.advance(SessionState::Identifying, SessionState::AwaitingReady)?;

        tokio::select! {
            _ = tokio::time::sleep(self.config.settle_delay) => {}
            _ = wait_until_terminal(self.state.subscribe()) => {
                return Err(GatewayError::ConnectionError(
                    "connection closed during identify".into(),
                ));
            }
        }

        let options = *self.options.lock().await;
        let frame = GatewayFrame::voice_state(&VoiceStatePayload::join(&self.target, &options))?;
        send_frame(&writer, &frame).await?;
        self.advance(SessionState::AwaitingReady, SessionState::Active)?;

        info!(
            session = %self.id,
            credential = %self.credential,
            channel = %self.target.channel_id,
            heartbeat_ms = hello.heartbeat_interval,
            "Session active"
        );
        Ok(())
    }

    /// Move `from -> to`, or report that the reader already ended the session.
    fn advance(&self, from: SessionState, to: SessionState) -> Result<(), GatewayError> {
        let moved = self.state.send_if_modified(|current| {
            if *current == from {
                *current = to;
                true
            } else {
                false
            }
        });
        if moved {
            Ok(())
        } else {
            Err(GatewayError::ConnectionError(format!(
                "connection lost while {from:?}"
            )))
        }
    }

    async fn fail(&self) {
        if let Some(link) = self.link.lock().await.take() {
            link.stop_tasks();
            close_writer(&link.writer).await;
        }
        self.state.send_if_modified(|current| {
            if *current == SessionState::Closed || *current == SessionState::Failed {
                false
            } else {
                *current = SessionState::Failed;
                true
            }
        });
    }

    // -----------------------------------------------------------------------
    // Settings
    // -----------------------------------------------------------------------

    /// Merge `patch` into the options and re-announce the voice state.
    ///
    /// Sessions that are not active keep the merged options but send
    /// nothing; that is reported as [`SettingsDelivery::Skipped`], not an error.
    pub async fn update_settings(
        &self,
        patch: PresencePatch,
    ) -> Result<SettingsDelivery, GatewayError> {
        let options = {
            let mut options = self.options.lock().await;
            patch.apply_to(&mut options);
            *options
        };

        if !self.is_active() {
            debug!(session = %self.id, state = ?self.state(), "Settings stored, session not active");
            return Ok(SettingsDelivery::Skipped);
        }
        let writer = self.link.lock().await.as_ref().map(|l| Arc::clone(&l.writer));
        let Some(writer) = writer else {
            return Ok(SettingsDelivery::Skipped);
        };

        let frame = GatewayFrame::voice_state(&VoiceStatePayload::join(&self.target, &options))?;
        send_frame(&writer, &frame).await?;
        debug!(session = %self.id, options = ?options, "Voice state updated");
        Ok(SettingsDelivery::Sent)
    }

    // -----------------------------------------------------------------------
    // Disconnect
    // -----------------------------------------------------------------------

    /// Leave the channel and close the socket. Safe to call repeatedly.
    ///
    /// A live session sends a leave frame and waits `leave_grace` before
    /// closing. Heartbeats stop either way, and the session ends `Closed`
    /// unless it had already `Failed`.
    pub async fn disconnect(&self) {
        let link = self.link.lock().await.take();

        if let Some(link) = link {
            link.heartbeat.abort();

            let leaving = self.state.send_if_modified(|current| {
                if current.is_live() {
                    *current = SessionState::Leaving;
                    true
                } else {
                    false
                }
            });

            if leaving {
                let leave = GatewayFrame::voice_state(&VoiceStatePayload::leave(&self.target));
                match leave {
                    Ok(frame) => {
                        if let Err(e) = send_frame(&link.writer, &frame).await {
                            debug!(session = %self.id, error = %e, "Leave frame not sent");
                        }
                    }
                    Err(e) => debug!(session = %self.id, error = %e, "Leave frame not built"),
                }
                tokio::time::sleep(self.config.leave_grace).await;
            }

            close_writer(&link.writer).await;
            link.reader.abort();
        }

        let closed = self.state.send_if_modified(|current| {
            if current.is_terminal() {
                false
            } else {
                *current = SessionState::Closed;
                true
            }
        });
        if closed {
            info!(session = %self.id, credential = %self.credential, "Session closed");
        }
    }
}

impl Drop for GatewaySession {
    fn drop(&mut self) {
        if let Some(link) = self.link.get_mut().take() {
            link.stop_tasks();
        }
    }
}
