//! HTTP and WebSocket request handlers
//!
//! This module organizes all handlers into logical groups:
//! - `api` - Health check and Prometheus scrape endpoints
//! - `twiml` - TwiML document returned for incoming calls
//! - `media_stream` - Telephony media WebSocket feeding the call relay

pub mod api;
pub mod media_stream;
pub mod twiml;

// Re-export commonly used handlers for convenient access
pub use media_stream::media_stream_handler;
pub use twiml::incoming_call;
