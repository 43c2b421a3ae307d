//! Desired presence flags and the voice channel they apply to.

use serde::{Deserialize, Serialize};

use crate::GatewayError;

/// Camera, microphone, deafen and stream flags for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceOptions {
    pub camera: bool,
    pub mic: bool,
    pub deafen: bool,
    pub stream: bool,
}

impl PresenceOptions {
    /// Deafening always mutes, whatever the mic flag says.
    pub fn self_mute(&self) -> bool {
        !self.mic || self.deafen
    }
}

/// A partial update to [`PresenceOptions`]. `None` fields keep their value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresencePatch {
    pub camera: Option<bool>,
    pub mic: Option<bool>,
    pub deafen: Option<bool>,
    pub stream: Option<bool>,
}

impl PresencePatch {
    pub fn apply_to(&self, options: &mut PresenceOptions) {
        if let Some(camera) = self.camera {
            options.camera = camera;
        }
        if let Some(mic) = self.mic {
            options.mic = mic;
        }
        if let Some(deafen) = self.deafen {
            options.deafen = deafen;
        }
        if let Some(stream) = self.stream {
            options.stream = stream;
        }
    }
}

/// Group (guild) and voice channel a session joins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceTarget {
    pub guild_id: String,
    pub channel_id: String,
}

impl VoiceTarget {
    /// Both ids are trimmed; either being empty is a `MissingTarget` error.
    pub fn new(guild_id: &str, channel_id: &str) -> Result<Self, GatewayError> {
        let guild_id = guild_id.trim();
        let channel_id = channel_id.trim();
        if guild_id.is_empty() || channel_id.is_empty() {
            return Err(GatewayError::MissingTarget);
        }
        Ok(Self {
            guild_id: guild_id.to_string(),
            channel_id: channel_id.to_string(),
        })
    }
}
