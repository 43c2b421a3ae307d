//! Gateway wire protocol: the `{op, d, s, t}` frame envelope and the
//! payloads this crate sends and understands.

use serde::{Deserialize, Serialize};

use crate::credential::Credential;
use crate::presence::{PresenceOptions, VoiceTarget};
use crate::GatewayError;

// ---------------------------------------------------------------------------
// Opcodes
// ---------------------------------------------------------------------------

pub mod opcodes {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const VOICE_STATE_UPDATE: u8 = 4;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A single gateway frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayFrame {
    pub op: u8,
    #[serde(default)]
    pub d: serde_json::Value,
    /// Sequence number, present on dispatch frames only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    /// Dispatch event name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayFrame {
    pub fn new(op: u8, payload: impl Serialize) -> Result<Self, GatewayError> {
        let d = serde_json::to_value(payload)
            .map_err(|e| GatewayError::Protocol(format!("failed to encode op {op}: {e}")))?;
        Ok(Self {
            op,
            d,
            s: None,
            t: None,
        })
    }

    /// Keepalive carrying the last seen sequence number (`null` before any dispatch).
    pub fn heartbeat(sequence: Option<u64>) -> Self {
        Self {
            op: opcodes::HEARTBEAT,
            d: sequence.map_or(serde_json::Value::Null, serde_json::Value::from),
            s: None,
            t: None,
        }
    }

    pub fn identify(
        credential: &Credential,
        properties: &ClientProperties,
    ) -> Result<Self, GatewayError> {
        Self::new(
            opcodes::IDENTIFY,
            IdentifyPayload {
                token: credential.expose(),
                properties,
            },
        )
    }

    pub fn voice_state(payload: &VoiceStatePayload) -> Result<Self, GatewayError> {
        Self::new(opcodes::VOICE_STATE_UPDATE, payload)
    }

    pub fn to_json(&self) -> Result<String, GatewayError> {
        serde_json::to_string(self)
            .map_err(|e| GatewayError::Protocol(format!("failed to encode frame: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Payload of the server's hello frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Milliseconds between heartbeats.
    pub heartbeat_interval: u64,
}

/// Client metadata sent with identify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProperties {
    #[serde(rename = "$os")]
    pub os: String,
    #[serde(rename = "$browser")]
    pub browser: String,
    #[serde(rename = "$device")]
    pub device: String,
}

impl Default for ClientProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: "chorus".to_string(),
            device: "chorus".to_string(),
        }
    }
}

#[derive(Serialize)]
struct IdentifyPayload<'a> {
    token: &'a str,
    properties: &'a ClientProperties,
}

/// Voice-state update: the one frame shape used to join, update and leave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceStatePayload {
    pub guild_id: String,
    /// `None` serializes as `null`, which means "leave the channel".
    pub channel_id: Option<String>,
    pub self_mute: bool,
    pub self_deaf: bool,
    pub self_video: bool,
    pub self_stream: bool,
}

impl VoiceStatePayload {
    pub fn join(target: &VoiceTarget, options: &PresenceOptions) -> Self {
        Self {
            guild_id: target.guild_id.clone(),
            channel_id: Some(target.channel_id.clone()),
            self_mute: options.self_mute(),
            self_deaf: options.deafen,
            self_video: options.camera,
            self_stream: options.stream,
        }
    }

    /// Leave signal: no channel, muted, not deafened.
    pub fn leave(target: &VoiceTarget) -> Self {
        Self {
            guild_id: target.guild_id.clone(),
            channel_id: None,
            self_mute: true,
            self_deaf: false,
            self_video: false,
            self_stream: false,
        }
    }
}
