//! Socket plumbing for a session: opening, hello, the heartbeat task and the
//! inbound reader task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chorus_common::SessionId;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use crate::protocol::{opcodes, GatewayFrame, HelloPayload};
use crate::GatewayError;

use super::types::SessionState;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type WsWriter = SplitSink<WsStream, WsMessage>;
pub(crate) type WsReader = SplitStream<WsStream>;
pub(crate) type SharedWriter = Arc<Mutex<WsWriter>>;

/// Sentinel stored in the sequence cell before any dispatch arrives.
const NO_SEQUENCE: u64 = u64::MAX;

/// Upper bound for one write or close on the socket, lock wait included.
pub(crate) const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Sequence tracking
// ---------------------------------------------------------------------------

/// Last dispatch sequence number seen on a connection.
#[derive(Debug)]
pub(crate) struct Sequence(AtomicU64);

impl Sequence {
    pub(crate) fn new() -> Self {
        Self(AtomicU64::new(NO_SEQUENCE))
    }

    pub(crate) fn get(&self) -> Option<u64> {
        match self.0.load(Ordering::Relaxed) {
            NO_SEQUENCE => None,
            seq => Some(seq),
        }
    }

    pub(crate) fn set(&self, seq: u64) {
        self.0.store(seq, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Opening
// ---------------------------------------------------------------------------

/// Open the websocket and wait for the server's hello.
///
/// Not bounded by any timeout itself; the caller wraps it.
pub(crate) async fn open_gateway(
    url: &str,
) -> Result<(WsWriter, WsReader, HelloPayload), GatewayError> {
    let (ws_stream, _) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| GatewayError::ConnectionError(format!("connect failed: {e}")))?;

    let (writer, mut reader) = ws_stream.split();
    let hello = read_hello(&mut reader).await?;
    if hello.heartbeat_interval == 0 {
        return Err(GatewayError::ConnectionError(
            "hello carried a zero heartbeat interval".into(),
        ));
    }
    Ok((writer, reader, hello))
}

async fn read_hello(reader: &mut WsReader) -> Result<HelloPayload, GatewayError> {
    while let Some(msg) = reader.next().await {
        match msg {
            Ok(WsMessage::Text(text)) => match serde_json::from_str::<GatewayFrame>(&text) {
                Ok(frame) if frame.op == opcodes::HELLO => {
                    return serde_json::from_value(frame.d)
                        .map_err(|e| GatewayError::ConnectionError(format!("malformed hello: {e}")));
                }
                Ok(frame) => debug!(op = frame.op, "Ignoring frame received before hello"),
                Err(e) => debug!(error = %e, "Unparseable frame before hello"),
            },
            Ok(WsMessage::Close(_)) => {
                return Err(GatewayError::ConnectionError(
                    "connection closed before hello".into(),
                ));
            }
            Ok(_) => {}
            Err(e) => {
                return Err(GatewayError::ConnectionError(format!(
                    "websocket error before hello: {e}"
                )));
            }
        }
    }
    Err(GatewayError::ConnectionError(
        "stream ended before hello".into(),
    ))
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

pub(crate) async fn send_frame(
    writer: &SharedWriter,
    frame: &GatewayFrame,
) -> Result<(), GatewayError> {
    send_frame_within(writer, frame, WRITE_TIMEOUT).await
}

pub(crate) async fn send_frame_within(
    writer: &SharedWriter,
    frame: &GatewayFrame,
    deadline: Duration,
) -> Result<(), GatewayError> {
    let json = frame.to_json()?;
    let send = async move {
        let mut sink = writer.lock().await;
        sink.send(WsMessage::Text(json.into())).await
    };
    match tokio::time::timeout(deadline, send).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(GatewayError::ConnectionError(format!("send failed: {e}"))),
        Err(_elapsed) => Err(GatewayError::ConnectionError(format!(
            "send timed out after {deadline:?}"
        ))),
    }
}

/// Close the socket, ignoring errors from an already-dead transport.
pub(crate) async fn close_writer(writer: &SharedWriter) {
    let close = async move {
        let mut sink = writer.lock().await;
        sink.close().await
    };
    match tokio::time::timeout(WRITE_TIMEOUT, close).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => trace!(error = %e, "Close on dead socket"),
        Err(_elapsed) => debug!("Close timed out, dropping socket"),
    }
}

/// Resolves once the session reaches a terminal state (or its owner is gone).
pub(crate) async fn wait_until_terminal(mut state_rx: watch::Receiver<SessionState>) {
    loop {
        let terminal = state_rx.borrow_and_update().is_terminal();
        if terminal || state_rx.changed().await.is_err() {
            return;
        }
    }
}

// ---------------------------------------------------------------------------
// Heartbeat
// ---------------------------------------------------------------------------

/// Send a heartbeat every `interval` until the session ends or a send fails.
///
/// The first beat goes out one full interval after hello.
pub(crate) async fn heartbeat_task(
    writer: SharedWriter,
    interval: Duration,
    sequence: Arc<Sequence>,
    state_rx: watch::Receiver<SessionState>,
    session: SessionId,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    let stopped = wait_until_terminal(state_rx);
    tokio::pin!(stopped);

    loop {
        tokio::select! {
            _ = &mut stopped => break,
            _ = ticker.tick() => {
                let frame = GatewayFrame::heartbeat(sequence.get());
                if let Err(e) = send_frame(&writer, &frame).await {
                    debug!(session = %session, error = %e, "Heartbeat failed, stopping");
                    break;
                }
                trace!(session = %session, "Heartbeat sent");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Consume inbound frames until the connection ends, then record the loss.
pub(crate) async fn reader_task(
    mut reader: WsReader,
    writer: SharedWriter,
    sequence: Arc<Sequence>,
    state: Arc<watch::Sender<SessionState>>,
    session: SessionId,
) {
    let reason = loop {
        match reader.next().await {
            Some(Ok(WsMessage::Text(text))) => match serde_json::from_str::<GatewayFrame>(&text) {
                Ok(frame) => {
                    if let Some(reason) = handle_frame(frame, &writer, &sequence, &session).await {
                        break reason;
                    }
                }
                Err(e) => debug!(session = %session, error = %e, "Unparseable gateway frame"),
            },
            Some(Ok(WsMessage::Close(frame))) => {
                break match frame {
                    Some(close) => format!(
                        "closed by server ({}: {})",
                        u16::from(close.code),
                        close.reason.as_str()
                    ),
                    None => "closed by server".to_string(),
                };
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => break format!("websocket error: {e}"),
            None => break "stream ended".to_string(),
        }
    };

    let mut previous = None;
    state.send_if_modified(|current| {
        let next = current.after_transport_lost();
        if next == *current {
            return false;
        }
        previous = Some(*current);
        *current = next;
        true
    });

    match previous {
        Some(SessionState::Leaving) | None => {
            debug!(session = %session, reason = %reason, "Gateway connection ended");
        }
        Some(from) => {
            warn!(session = %session, from = ?from, reason = %reason, "Gateway connection lost");
        }
    }
}

/// Handle one inbound frame. Returns a reason when the server ends the session.
async fn handle_frame(
    frame: GatewayFrame,
    writer: &SharedWriter,
    sequence: &Sequence,
    session: &SessionId,
) -> Option<String> {
    match frame.op {
        opcodes::DISPATCH => {
            if let Some(seq) = frame.s {
                sequence.set(seq);
            }
            if frame.t.as_deref() == Some("READY") {
                let user = frame
                    .d
                    .get("user")
                    .and_then(|u| u.get("username"))
                    .and_then(|n| n.as_str())
                    .unwrap_or("unknown");
                info!(session = %session, user = %user, "Gateway ready");
            } else {
                trace!(session = %session, event = ?frame.t, "Dispatch received");
            }
            None
        }
        opcodes::HEARTBEAT => {
            debug!(session = %session, "Server requested heartbeat");
            if let Err(e) = send_frame(writer, &GatewayFrame::heartbeat(sequence.get())).await {
                return Some(e.to_string());
            }
            None
        }
        opcodes::HEARTBEAT_ACK => {
            trace!(session = %session, "Heartbeat acknowledged");
            None
        }
        opcodes::RECONNECT => Some("server requested reconnect".to_string()),
        opcodes::INVALID_SESSION => Some("invalid session".to_string()),
        op => {
            debug!(session = %session, op, "Unhandled gateway opcode");
            None
        }
    }
}
