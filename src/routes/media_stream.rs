//! Media stream WebSocket route configuration
//!
//! `GET /media-stream` upgrades to the Twilio Media Streams protocol. The
//! TwiML returned by `/incoming-call` points Twilio here.

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::media_stream::media_stream_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the media stream router
pub fn create_media_stream_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/media-stream", get(media_stream_handler))
        .layer(TraceLayer::new_for_http())
}
