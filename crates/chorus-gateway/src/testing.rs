//! In-process gateway used by the session and orchestrator tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::credential::Credential;
use crate::protocol::{opcodes, GatewayFrame, VoiceStatePayload};
use crate::session::{SessionConfig, SessionState};

/// Decides per connection (0-based accept order) whether hello is sent.
type HelloPlan = Arc<dyn Fn(usize) -> bool + Send + Sync>;

pub(crate) struct MockGateway {
    pub url: String,
    frames: Arc<Mutex<Vec<GatewayFrame>>>,
    push_tx: broadcast::Sender<Message>,
    accept_loop: JoinHandle<()>,
}

impl MockGateway {
    /// Gateway that greets every connection with the given heartbeat interval.
    pub async fn start(heartbeat_ms: u64) -> Self {
        Self::start_with(heartbeat_ms, |_| true).await
    }

    pub async fn start_with(
        heartbeat_ms: u64,
        plan: impl Fn(usize) -> bool + Send + Sync + 'static,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let frames = Arc::new(Mutex::new(Vec::new()));
        let (push_tx, _) = broadcast::channel(16);
        let plan: HelloPlan = Arc::new(plan);
        let accepted = Arc::new(AtomicUsize::new(0));

        let loop_frames = Arc::clone(&frames);
        let loop_push = push_tx.clone();
        let accept_loop = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let index = accepted.fetch_add(1, Ordering::SeqCst);
                let send_hello = plan(index);
                let frames = Arc::clone(&loop_frames);
                let push_rx = loop_push.subscribe();
                tokio::spawn(async move {
                    if let Ok(ws) = tokio_tungstenite::accept_async(stream).await {
                        serve(ws, send_hello, heartbeat_ms, frames, push_rx).await;
                    }
                });
            }
        });

        Self {
            url: format!("ws://{addr}"),
            frames,
            push_tx,
            accept_loop,
        }
    }

    /// Send a raw message to every open connection.
    pub fn push(&self, message: Message) {
        let _ = self.push_tx.send(message);
    }

    pub fn push_frame(&self, frame: &GatewayFrame) {
        self.push(Message::Text(frame.to_json().unwrap().into()));
    }

    pub async fn frames(&self) -> Vec<GatewayFrame> {
        self.frames.lock().await.clone()
    }

    pub async fn frames_with_op(&self, op: u8) -> Vec<GatewayFrame> {
        self.frames()
            .await
            .into_iter()
            .filter(|f| f.op == op)
            .collect()
    }

    pub async fn voice_states(&self) -> Vec<VoiceStatePayload> {
        self.frames_with_op(opcodes::VOICE_STATE_UPDATE)
            .await
            .into_iter()
            .map(|f| serde_json::from_value(f.d).unwrap())
            .collect()
    }

    /// Poll until at least `count` frames with `op` have arrived.
    pub async fn wait_for_op(&self, op: u8, count: usize) -> Vec<GatewayFrame> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let frames = self.frames_with_op(op).await;
            if frames.len() >= count {
                return frames;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {count} frames with op {op}, got {}",
                frames.len()
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for MockGateway {
    fn drop(&mut self) {
        self.accept_loop.abort();
    }
}

async fn serve(
    ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    send_hello: bool,
    heartbeat_ms: u64,
    frames: Arc<Mutex<Vec<GatewayFrame>>>,
    mut push_rx: broadcast::Receiver<Message>,
) {
    let (mut sink, mut stream) = ws.split();

    if send_hello {
        let hello = serde_json::json!({
            "op": opcodes::HELLO,
            "d": { "heartbeat_interval": heartbeat_ms }
        });
        if sink.send(Message::Text(hello.to_string().into())).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            pushed = push_rx.recv() => {
                let Ok(message) = pushed else { break };
                let closing = matches!(message, Message::Close(_));
                if sink.send(message).await.is_err() || closing {
                    break;
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(frame) = serde_json::from_str::<GatewayFrame>(&text) {
                        frames.lock().await.push(frame);
                    }
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                _ => {}
            }
        }
    }
}

/// Session timings short enough for tests.
pub(crate) fn fast_config(url: &str) -> SessionConfig {
    SessionConfig {
        gateway_url: url.to_string(),
        connect_timeout: Duration::from_secs(2),
        settle_delay: Duration::from_millis(20),
        leave_grace: Duration::from_millis(10),
        ..SessionConfig::default()
    }
}

/// A valid three-segment credential built from `seed`.
pub(crate) fn credential(seed: char) -> Credential {
    let raw = format!(
        "{}.{}.{}",
        seed.to_string().repeat(24),
        "Xy_-12",
        seed.to_string().repeat(27)
    );
    Credential::parse(&raw).unwrap()
}

/// Wait until the state watched by `rx` equals `expected`.
pub(crate) async fn wait_for_state(
    mut rx: tokio::sync::watch::Receiver<SessionState>,
    expected: SessionState,
) {
    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if *rx.borrow_and_update() == expected {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    })
    .await;
    assert!(reached.is_ok(), "timed out waiting for {expected:?}");
}
