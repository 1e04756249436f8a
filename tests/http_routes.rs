//! HTTP Route Tests
//!
//! Exercises the router in-process with `tower::ServiceExt::oneshot`.

use axum::{body::Body, http::Request, http::StatusCode};
use serde_json::Value;
use tower::util::ServiceExt;

use callbridge_gateway::config::{RealtimeSettings, RelaySettings, TwimlSettings};
use callbridge_gateway::{AppState, LatencyMetric, ServerConfig, routes};

fn create_test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 5050,
        tls: None,
        openai_api_key: Some("sk-test".to_string()),
        realtime: RealtimeSettings::default(),
        relay: RelaySettings::default(),
        twiml: TwimlSettings {
            greeting: "Hello, you are through to Roberto at Veeno Bars Leicester.".to_string(),
            say_voice: "Google.en-GB-Standard-A".to_string(),
        },
    }
}

async fn body_string(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = routes::create_router(AppState::new(create_test_config()).unwrap());

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["message"], "Twilio Media Stream Server is running!");
}

#[tokio::test]
async fn test_incoming_call_uses_host_header() {
    let app = routes::create_router(AppState::new(create_test_config()).unwrap());

    let request = Request::builder()
        .method("POST")
        .uri("/incoming-call")
        .header("host", "abc123.ngrok.app")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from("CallSid=CA123&From=%2B441234567890"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/xml"
    );
    let xml = body_string(response).await;
    assert!(xml.contains(
        r#"<Say voice="Google.en-GB-Standard-A">Hello, you are through to Roberto at Veeno Bars Leicester.</Say>"#
    ));
    assert!(xml.contains(r#"<Stream url="wss://abc123.ngrok.app/media-stream" />"#));
}

#[tokio::test]
async fn test_incoming_call_accepts_get() {
    let app = routes::create_router(AppState::new(create_test_config()).unwrap());

    let request = Request::builder()
        .uri("/incoming-call")
        .header("host", "voice.example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        body_string(response)
            .await
            .contains("wss://voice.example.com/media-stream")
    );
}

#[tokio::test]
async fn test_metrics_exposition() {
    let state = AppState::new(create_test_config()).unwrap();
    state.metrics.add_bytes_in(480);
    state
        .metrics
        .observe_latency(LatencyMetric::Felt, 640.0);
    let app = routes::create_router(state);

    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );
    let text = body_string(response).await;
    assert!(text.contains("twilio_audio_bytes_in_total 480"));
    assert!(text.contains("felt_latency_ms_count 1"));
    assert!(text.contains("process_"));
}

#[tokio::test]
async fn test_media_stream_requires_upgrade() {
    let app = routes::create_router(AppState::new(create_test_config()).unwrap());

    let request = Request::builder()
        .uri("/media-stream")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    // Plain GET without upgrade headers is rejected, but the route exists
    assert_ne!(response.status(), StatusCode::NOT_FOUND);
    assert_ne!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_state_requires_api_key() {
    let mut config = create_test_config();
    config.openai_api_key = None;
    assert!(AppState::new(config).is_err());
}
