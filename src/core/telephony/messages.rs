//! Twilio Media Streams message types.
//!
//! Inbound events (from the telephony edge):
//! - connected - WebSocket established
//! - start - Stream metadata, carries `streamSid`
//! - media - Base64 audio payload with a stream-relative timestamp
//! - mark - Echo of a mark we sent, once its audio has been played
//! - stop - Stream ended
//!
//! Outbound events (to the telephony edge):
//! - media - Base64 audio to play to the caller
//! - mark - Named marker acknowledged after preceding audio is played

use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::RelayResult;

// =============================================================================
// Inbound Events
// =============================================================================

/// Events received from the telephony edge.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelephonyInbound {
    Connected {
        #[serde(default)]
        protocol: Option<String>,
    },

    Start {
        start: StreamStart,
    },

    Media {
        media: MediaPayload,
    },

    Mark {
        mark: MarkPayload,
    },

    Stop {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
    },

    /// Any event kind not listed above
    #[serde(other)]
    Other,
}

impl TelephonyInbound {
    /// Event name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Start { .. } => "start",
            Self::Media { .. } => "media",
            Self::Mark { .. } => "mark",
            Self::Stop { .. } => "stop",
            Self::Other => "other",
        }
    }
}

/// Stream metadata from the `start` event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStart {
    pub stream_sid: String,
    #[serde(default)]
    pub call_sid: Option<String>,
    #[serde(default)]
    pub account_sid: Option<String>,
}

/// Audio chunk from the `media` event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MediaPayload {
    /// Base64 encoded audio, relayed without decoding
    pub payload: String,
    /// Milliseconds since stream start
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub track: Option<String>,
}

/// Mark echo from the `mark` event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MarkPayload {
    pub name: String,
}

/// Accept the media timestamp as a JSON number or a numeric string.
///
/// Unparsable values read as absent rather than rejecting the whole frame.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Float(f64),
        Text(String),
        Null,
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Int(value) => Some(value),
        Raw::Float(value) if value.is_finite() && value >= 0.0 => Some(value as u64),
        Raw::Float(_) | Raw::Null => None,
        Raw::Text(text) => text.trim().parse::<u64>().ok(),
    })
}

// =============================================================================
// Outbound Events
// =============================================================================

/// Events sent to the telephony edge.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelephonyOutbound<'a> {
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: &'a str,
        media: OutboundMedia<'a>,
    },

    Mark {
        #[serde(rename = "streamSid")]
        stream_sid: &'a str,
        mark: OutboundMark<'a>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundMedia<'a> {
    pub payload: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundMark<'a> {
    pub name: &'a str,
}

/// Serialize a `media` frame carrying `payload` unmodified.
pub fn media_frame(stream_sid: &str, payload: &str) -> RelayResult<String> {
    Ok(serde_json::to_string(&TelephonyOutbound::Media {
        stream_sid,
        media: OutboundMedia { payload },
    })?)
}

/// Serialize a `mark` frame.
pub fn mark_frame(stream_sid: &str, name: &str) -> RelayResult<String> {
    Ok(serde_json::to_string(&TelephonyOutbound::Mark {
        stream_sid,
        mark: OutboundMark { name },
    })?)
}
