//! Orchestrator tests against the in-process gateway.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_tungstenite::tungstenite::Message;

use super::*;
use crate::credential::Credential;
use crate::directory::{DirectoryLookup, NoDirectory};
use crate::presence::{PresenceOptions, PresencePatch};
use crate::protocol::opcodes;
use crate::session::{SessionConfig, SessionState};
use crate::testing::{credential, fast_config, wait_for_state, MockGateway};
use crate::GatewayError;

struct StubDirectory(HashMap<String, String>);

#[async_trait]
impl DirectoryLookup for StubDirectory {
    async fn lookup(&self, credential: &Credential) -> Option<String> {
        self.0.get(credential.expose()).cloned()
    }
}

/// Resolves every credential to the same name after a pause.
struct SlowDirectory(Duration);

#[async_trait]
impl DirectoryLookup for SlowDirectory {
    async fn lookup(&self, _credential: &Credential) -> Option<String> {
        tokio::time::sleep(self.0).await;
        Some("Late".to_string())
    }
}

fn slow_settle(url: &str) -> SessionConfig {
    SessionConfig {
        settle_delay: Duration::from_millis(300),
        ..fast_config(url)
    }
}

fn failure_for(events: &[OrchestratorEvent], wanted: &Credential) -> Option<String> {
    events.iter().find_map(|e| match e {
        OrchestratorEvent::SessionFailed {
            credential, error, ..
        } if credential == wanted => Some(error.clone()),
        _ => None,
    })
}

fn config(session: SessionConfig) -> OrchestratorConfig {
    OrchestratorConfig {
        session,
        pacing: JoinPacing {
            base: Duration::from_millis(5),
            jitter: Duration::from_millis(5),
        },
    }
}

fn orchestrator(url: &str) -> (SessionOrchestrator, UnboundedReceiver<OrchestratorEvent>) {
    SessionOrchestrator::new(config(fast_config(url)), Arc::new(NoDirectory))
}

fn drain(rx: &mut UnboundedReceiver<OrchestratorEvent>) -> Vec<OrchestratorEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn mic_on() -> PresenceOptions {
    PresenceOptions {
        mic: true,
        ..Default::default()
    }
}

fn deafen() -> PresencePatch {
    PresencePatch {
        deafen: Some(true),
        ..Default::default()
    }
}

#[tokio::test]
async fn add_rejects_invalid_and_duplicate() {
    let (orchestrator, mut events) = orchestrator("ws://127.0.0.1:9");

    assert!(matches!(
        orchestrator.add_credential("not-a-token").await,
        Err(GatewayError::InvalidFormat)
    ));
    let added = orchestrator
        .add_credential(&format!("  {}  ", credential('a').expose()))
        .await
        .unwrap();
    assert_eq!(added, credential('a'));
    assert!(matches!(
        orchestrator.add_credential(credential('a').expose()).await,
        Err(GatewayError::Duplicate)
    ));

    assert_eq!(orchestrator.credentials().await, vec![credential('a')]);
    let added: Vec<_> = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, OrchestratorEvent::CredentialAdded { .. }))
        .collect();
    assert_eq!(added.len(), 1);
}

#[tokio::test]
async fn names_resolve_in_background_with_fallback() {
    let names = HashMap::from([(credential('a').expose().to_string(), "Alice".to_string())]);
    let (orchestrator, mut events) = SessionOrchestrator::new(
        config(fast_config("ws://127.0.0.1:9")),
        Arc::new(StubDirectory(names)),
    );

    orchestrator.add_credential(credential('a').expose()).await.unwrap();
    orchestrator.add_credential(credential('b').expose()).await.unwrap();

    let resolved = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(OrchestratorEvent::NameResolved {
                credential,
                display_name,
            }) = events.recv().await
            {
                return (credential, display_name);
            }
        }
    })
    .await
    .expect("name never resolved");

    assert_eq!(resolved, (credential('a'), "Alice".to_string()));
    assert_eq!(orchestrator.display_name(&credential('a')).await, "Alice");
    assert_eq!(
        orchestrator.display_name(&credential('b')).await,
        "unknown user (bbbbbbbb...)"
    );
}

#[tokio::test]
async fn join_checks_target_before_credentials() {
    let (orchestrator, _events) = orchestrator("ws://127.0.0.1:9");

    assert!(matches!(
        orchestrator.join_all("", "c1", mic_on()).await,
        Err(GatewayError::MissingTarget)
    ));
    assert!(matches!(
        orchestrator.join_all("g1", "  ", mic_on()).await,
        Err(GatewayError::MissingTarget)
    ));
    assert!(matches!(
        orchestrator.join_all("g1", "c1", mic_on()).await,
        Err(GatewayError::NoCredentials)
    ));
}

#[tokio::test]
async fn one_silent_gateway_connection_does_not_stop_the_sequence() {
    let gateway = MockGateway::start_with(60_000, |index| index != 1).await;
    let session = SessionConfig {
        connect_timeout: Duration::from_millis(300),
        ..fast_config(&gateway.url)
    };
    let (orchestrator, mut events) = SessionOrchestrator::new(config(session), Arc::new(NoDirectory));
    for seed in ['a', 'b', 'c'] {
        orchestrator.add_credential(credential(seed).expose()).await.unwrap();
    }
    drain(&mut events);

    let report = orchestrator.join_all("g1", "c1", mic_on()).await.unwrap();
    assert_eq!(report, JoinReport { succeeded: 2, total: 3 });
    assert_eq!(orchestrator.live_count().await, 2);

    let mut live = orchestrator.live_credentials().await;
    live.sort_by(|a, b| a.expose().cmp(b.expose()));
    assert_eq!(live, vec![credential('a'), credential('c')]);

    let events = drain(&mut events);
    let progress: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            OrchestratorEvent::Progress { current, total } => Some((*current, *total)),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
    assert!(events.iter().any(|e| matches!(
        e,
        OrchestratorEvent::SessionFailed { credential: c, .. } if *c == credential('b')
    )));

    let outcome = orchestrator.broadcast_settings(deafen()).await;
    assert_eq!(
        outcome,
        BroadcastOutcome::Dispatched {
            succeeded: 2,
            failed: 0,
            skipped: 0
        }
    );

    let states = gateway.wait_for_op(opcodes::VOICE_STATE_UPDATE, 4).await;
    assert_eq!(states.len(), 4);
    for frame in &states[2..] {
        assert_eq!(frame.d["self_deaf"], true);
        assert_eq!(frame.d["self_mute"], true);
    }
    assert!(orchestrator.options().await.deafen);
}

#[tokio::test]
async fn leave_all_clears_live_sessions() {
    let gateway = MockGateway::start(60_000).await;
    let (orchestrator, mut events) = orchestrator(&gateway.url);
    orchestrator.add_credential(credential('a').expose()).await.unwrap();
    orchestrator.add_credential(credential('b').expose()).await.unwrap();
    orchestrator.join_all("g1", "c1", mic_on()).await.unwrap();

    assert!(matches!(
        orchestrator.leave_all("g1", "").await,
        Err(GatewayError::MissingTarget)
    ));
    assert_eq!(orchestrator.live_count().await, 2);

    assert_eq!(orchestrator.leave_all("g1", "c1").await.unwrap(), 2);
    assert_eq!(orchestrator.live_count().await, 0);

    let leaves: Vec<_> = gateway
        .wait_for_op(opcodes::VOICE_STATE_UPDATE, 4)
        .await
        .into_iter()
        .filter(|f| f.d["channel_id"].is_null())
        .collect();
    assert_eq!(leaves.len(), 2);

    let outcome = orchestrator.broadcast_settings(deafen()).await;
    assert_eq!(outcome, BroadcastOutcome::NoLiveSessions);
    assert_eq!(outcome.succeeded(), 0);
    assert_eq!(outcome.failed(), 0);

    assert!(drain(&mut events)
        .iter()
        .any(|e| matches!(e, OrchestratorEvent::LeftAll { count: 2 })));
    // Credentials stay registered for the next join.
    assert_eq!(orchestrator.credentials().await.len(), 2);
}

#[tokio::test]
async fn remove_credential_disconnects_its_session() {
    let gateway = MockGateway::start(60_000).await;
    let (orchestrator, _events) = orchestrator(&gateway.url);
    orchestrator.add_credential(credential('a').expose()).await.unwrap();
    orchestrator.join_all("g1", "c1", mic_on()).await.unwrap();

    let session = orchestrator.session(credential('a').expose()).await.unwrap();
    assert!(orchestrator.remove_credential(credential('a').expose()).await);
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(orchestrator.live_count().await, 0);
    assert!(orchestrator.credentials().await.is_empty());

    let leave = gateway.voice_states().await.pop().unwrap();
    assert_eq!(leave.channel_id, None);

    // Idempotent.
    assert!(!orchestrator.remove_credential(credential('a').expose()).await);
}

#[tokio::test]
async fn sessions_ended_by_the_server_are_pruned() {
    let gateway = MockGateway::start(60_000).await;
    let (orchestrator, _events) = orchestrator(&gateway.url);
    orchestrator.add_credential(credential('a').expose()).await.unwrap();
    orchestrator.join_all("g1", "c1", mic_on()).await.unwrap();

    let session = orchestrator.session(credential('a').expose()).await.unwrap();
    gateway.push(Message::Close(None));
    wait_for_state(session.subscribe(), SessionState::Closed).await;

    assert!(orchestrator.session(credential('a').expose()).await.is_none());
    assert_eq!(orchestrator.live_count().await, 0);
    assert_eq!(
        orchestrator.broadcast_settings(deafen()).await,
        BroadcastOutcome::NoLiveSessions
    );
}

#[tokio::test]
async fn concurrent_join_is_rejected_and_rejoin_replaces() {
    let gateway = MockGateway::start(60_000).await;
    let (orchestrator, _events) =
        SessionOrchestrator::new(config(slow_settle(&gateway.url)), Arc::new(NoDirectory));
    let orchestrator = Arc::new(orchestrator);
    orchestrator.add_credential(credential('a').expose()).await.unwrap();

    let first = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.join_all("g1", "c1", mic_on()).await })
    };
    gateway.wait_for_op(opcodes::IDENTIFY, 1).await;
    assert!(matches!(
        orchestrator.join_all("g1", "c1", mic_on()).await,
        Err(GatewayError::JoinInProgress)
    ));
    assert_eq!(first.await.unwrap().unwrap().succeeded, 1);
    let first_session = orchestrator.session(credential('a').expose()).await.unwrap();

    // The guard is released once the sequence ends.
    let report = orchestrator.join_all("g1", "c2", mic_on()).await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(first_session.state(), SessionState::Closed);
    assert_eq!(orchestrator.live_count().await, 1);

    let replacement = orchestrator.session(credential('a').expose()).await.unwrap();
    assert_eq!(replacement.target().channel_id, "c2");
}

#[tokio::test]
async fn removal_during_connect_leaves_no_live_session() {
    let gateway = MockGateway::start(60_000).await;
    let (orchestrator, mut events) =
        SessionOrchestrator::new(config(slow_settle(&gateway.url)), Arc::new(NoDirectory));
    let orchestrator = Arc::new(orchestrator);
    orchestrator.add_credential(credential('a').expose()).await.unwrap();

    let joining = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.join_all("g1", "c1", mic_on()).await })
    };
    gateway.wait_for_op(opcodes::IDENTIFY, 1).await;
    assert!(orchestrator.remove_credential(credential('a').expose()).await);

    let report = joining.await.unwrap().unwrap();
    assert_eq!(report, JoinReport { succeeded: 0, total: 1 });
    assert_eq!(orchestrator.live_count().await, 0);
    assert!(orchestrator.session(credential('a').expose()).await.is_none());

    let events = drain(&mut events);
    assert_eq!(
        failure_for(&events, &credential('a')).as_deref(),
        Some("credential removed during join")
    );

    // The session that finished connecting was told to leave.
    let states = gateway.wait_for_op(opcodes::VOICE_STATE_UPDATE, 2).await;
    assert!(states.last().unwrap().d["channel_id"].is_null());
}

#[tokio::test]
async fn removal_before_its_turn_skips_the_credential() {
    let gateway = MockGateway::start(60_000).await;
    let (orchestrator, mut events) =
        SessionOrchestrator::new(config(slow_settle(&gateway.url)), Arc::new(NoDirectory));
    let orchestrator = Arc::new(orchestrator);
    orchestrator.add_credential(credential('a').expose()).await.unwrap();
    orchestrator.add_credential(credential('b').expose()).await.unwrap();

    let joining = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.join_all("g1", "c1", mic_on()).await })
    };
    gateway.wait_for_op(opcodes::IDENTIFY, 1).await;
    assert!(orchestrator.remove_credential(credential('b').expose()).await);

    let report = joining.await.unwrap().unwrap();
    assert_eq!(report, JoinReport { succeeded: 1, total: 2 });
    assert_eq!(orchestrator.live_credentials().await, vec![credential('a')]);
    assert_eq!(gateway.frames_with_op(opcodes::IDENTIFY).await.len(), 1);

    let events = drain(&mut events);
    assert_eq!(
        failure_for(&events, &credential('b')).as_deref(),
        Some("credential removed")
    );
    let progress: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            OrchestratorEvent::Progress { current, total } => Some((*current, *total)),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![(1, 2), (2, 2)]);
}

#[tokio::test]
async fn name_resolved_after_removal_is_ignored() {
    let (orchestrator, mut events) = SessionOrchestrator::new(
        config(fast_config("ws://127.0.0.1:9")),
        Arc::new(SlowDirectory(Duration::from_millis(50))),
    );
    orchestrator.add_credential(credential('a').expose()).await.unwrap();
    assert!(orchestrator.remove_credential(credential('a').expose()).await);

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(!drain(&mut events)
        .iter()
        .any(|e| matches!(e, OrchestratorEvent::NameResolved { .. })));
    assert_eq!(
        orchestrator.display_name(&credential('a')).await,
        credential('a').fallback_name()
    );
}
