//! Speech-to-speech AI session over the OpenAI Realtime API.

pub mod client;
pub mod messages;

pub use client::{RealtimeConnector, RealtimeSocket};
pub use messages::{ClientEvent, ServerEvent};
