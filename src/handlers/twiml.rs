//! TwiML for incoming calls
//!
//! Twilio requests `/incoming-call` when a call arrives. The response greets
//! the caller, pauses, then connects the call audio to `/media-stream` on the
//! host the request was addressed to.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, header},
    response::IntoResponse,
};
use tracing::info;

use crate::config::TwimlSettings;
use crate::state::AppState;

/// Handle an incoming call webhook
pub async fn incoming_call(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| state.config.address());

    info!(%host, "Incoming call");

    (
        [(header::CONTENT_TYPE, "text/xml")],
        render_twiml(&state.config.twiml, &host),
    )
}

/// Render the TwiML document connecting the call to `wss://<host>/media-stream`
pub fn render_twiml(settings: &TwimlSettings, host: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Say voice="{voice}">{greeting}</Say>
  <Pause length="1"/>
  <Connect>
    <Stream url="wss://{host}/media-stream" />
  </Connect>
</Response>"#,
        voice = xml_escape(&settings.say_voice),
        greeting = xml_escape(&settings.greeting),
        host = xml_escape(host),
    )
}

fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
