//! Twilio Media Streams protocol.
//!
//! The telephony edge delivers call audio as JSON text frames over a
//! WebSocket accepted on `/media-stream`.

pub mod messages;

pub use messages::{
    MarkPayload, MediaPayload, StreamStart, TelephonyInbound, TelephonyOutbound, mark_frame,
    media_frame,
};
