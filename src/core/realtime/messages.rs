//! OpenAI Realtime API WebSocket message types.
//!
//! Only the subset of the protocol the relay uses is modelled. Every other
//! server event deserializes to [`ServerEvent::Other`].
//!
//! Client events (sent to server):
//! - session.update - Configure audio formats, voice, VAD and instructions
//! - input_audio_buffer.append - Append caller audio to the input buffer
//!
//! Server events (received from server):
//! - input_audio_buffer.speech_stopped - VAD detected end of caller speech
//! - response.output_audio.delta - Response audio chunk (`response.audio.delta` on older models)
//! - response.done - Response complete
//! - error, session.created, session.updated, input_audio_buffer.committed,
//!   input_audio_buffer.speech_started, response.content.done,
//!   rate_limits.updated - logged for diagnostics

use serde::{Deserialize, Serialize};

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration sent with `session.update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session type, always `realtime` for speech-to-speech
    #[serde(rename = "type")]
    pub session_type: String,
    pub model: String,
    pub output_modalities: Vec<String>,
    pub audio: AudioConfig,
    /// System instructions, passed through unmodified
    pub instructions: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    pub input: AudioInputConfig,
    pub output: AudioOutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioInputConfig {
    pub format: AudioFormat,
    pub turn_detection: TurnDetection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioOutputConfig {
    pub format: AudioFormat,
    pub voice: String,
}

/// Audio encodings accepted by the Realtime API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AudioFormat {
    /// G.711 u-law at 8 kHz, the telephony edge's native encoding
    #[serde(rename = "audio/pcmu")]
    Pcmu,
    /// G.711 a-law at 8 kHz
    #[serde(rename = "audio/pcma")]
    Pcma,
    /// 16-bit little-endian PCM
    #[serde(rename = "audio/pcm")]
    Pcm { rate: u32 },
}

/// Turn detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        #[serde(skip_serializing_if = "Option::is_none", default)]
        threshold: Option<f32>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        prefix_padding_ms: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        silence_duration_ms: Option<u32>,
    },
}

// =============================================================================
// Client Events
// =============================================================================

/// Events sent to the Realtime API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    /// Base64 audio, forwarded exactly as received from the telephony edge
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },
}

// =============================================================================
// Server Events
// =============================================================================

/// Events received from the Realtime API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        #[serde(default)]
        audio_end_ms: Option<u64>,
        #[serde(default)]
        item_id: Option<String>,
    },

    #[serde(rename = "response.output_audio.delta", alias = "response.audio.delta")]
    OutputAudioDelta {
        /// Base64 audio chunk
        delta: String,
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        item_id: Option<String>,
    },

    #[serde(rename = "response.done")]
    ResponseDone {
        #[serde(default)]
        response: Option<serde_json::Value>,
    },

    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        error: Option<ApiError>,
    },

    #[serde(rename = "session.created")]
    SessionCreated,

    #[serde(rename = "session.updated")]
    SessionUpdated,

    #[serde(rename = "input_audio_buffer.committed")]
    InputAudioBufferCommitted {
        #[serde(default)]
        item_id: Option<String>,
    },

    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        #[serde(default)]
        audio_start_ms: Option<u64>,
    },

    #[serde(rename = "response.content.done")]
    ResponseContentDone,

    #[serde(rename = "rate_limits.updated")]
    RateLimitsUpdated {
        #[serde(default)]
        rate_limits: Option<serde_json::Value>,
    },

    /// Any event kind the relay does not consume
    #[serde(other)]
    Other,
}

impl ServerEvent {
    /// Event type for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SpeechStopped { .. } => "input_audio_buffer.speech_stopped",
            Self::OutputAudioDelta { .. } => "response.output_audio.delta",
            Self::ResponseDone { .. } => "response.done",
            Self::Error { .. } => "error",
            Self::SessionCreated => "session.created",
            Self::SessionUpdated => "session.updated",
            Self::InputAudioBufferCommitted { .. } => "input_audio_buffer.committed",
            Self::SpeechStarted { .. } => "input_audio_buffer.speech_started",
            Self::ResponseContentDone => "response.content.done",
            Self::RateLimitsUpdated { .. } => "rate_limits.updated",
            Self::Other => "other",
        }
    }

    /// Whether this event is logged at info level for diagnostics
    pub fn is_diagnostic(&self) -> bool {
        matches!(
            self,
            Self::Error { .. }
                | Self::SessionCreated
                | Self::SessionUpdated
                | Self::InputAudioBufferCommitted { .. }
                | Self::SpeechStarted { .. }
                | Self::ResponseContentDone
                | Self::RateLimitsUpdated { .. }
        )
    }
}

/// Error details from an `error` event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiError {
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
