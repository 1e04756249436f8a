use axum::{
    Router,
    routing::{any, get},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{api, twiml};
use crate::state::AppState;
use std::sync::Arc;

/// Create the HTTP router: health, TwiML webhook and metrics scrape
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::health_check))
        // Twilio may be configured to GET or POST the webhook
        .route("/incoming-call", any(twiml::incoming_call))
        .route("/metrics", get(api::metrics_handler))
        .layer(TraceLayer::new_for_http())
}
