//! Test doubles for the relay's external peers
//!
//! - `realtime_mock`: scripted Realtime API WebSocket server
//! - [`RecordingSink`]: metrics sink that keeps every observation
//! - config and server helpers shared by the integration tests

// Allow dead code in test infrastructure - not every test binary uses every helper
#![allow(dead_code)]

pub mod realtime_mock;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use callbridge_gateway::config::{RealtimeSettings, RelaySettings, TwimlSettings};
use callbridge_gateway::{AppState, LatencyMetric, MetricsSink, ServerConfig, routes};
use parking_lot::Mutex;
use tokio::net::TcpListener;

/// In-memory metrics sink
#[derive(Default)]
pub struct RecordingSink {
    pub bytes_in: Mutex<u64>,
    pub bytes_out: Mutex<u64>,
    pub samples: Mutex<Vec<(LatencyMetric, f64)>>,
}

impl RecordingSink {
    pub fn samples_for(&self, metric: LatencyMetric) -> Vec<f64> {
        self.samples
            .lock()
            .iter()
            .filter(|(m, _)| *m == metric)
            .map(|(_, v)| *v)
            .collect()
    }

    /// Poll until `metric` has at least `count` samples
    pub async fn wait_for(&self, metric: LatencyMetric, count: usize) -> Vec<f64> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let samples = self.samples_for(metric);
            if samples.len() >= count || tokio::time::Instant::now() >= deadline {
                return samples;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl MetricsSink for RecordingSink {
    fn add_bytes_in(&self, bytes: u64) {
        *self.bytes_in.lock() += bytes;
    }

    fn add_bytes_out(&self, bytes: u64) {
        *self.bytes_out.lock() += bytes;
    }

    fn observe_latency(&self, metric: LatencyMetric, value_ms: f64) {
        self.samples.lock().push((metric, value_ms));
    }

    fn render(&self) -> String {
        String::new()
    }
}

/// Configuration pointing the relay at `realtime_url`
pub fn create_test_config(realtime_url: &str) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        tls: None,
        openai_api_key: Some("sk-test".to_string()),
        realtime: RealtimeSettings {
            url: realtime_url.to_string(),
            instructions: "You are a test assistant.".to_string(),
            ..RealtimeSettings::default()
        },
        relay: RelaySettings {
            liveness_probe_interval_ms: 5000,
            session_update_delay_ms: 50,
        },
        twiml: TwimlSettings::default(),
    }
}

/// Serve the full router on an ephemeral port
pub async fn spawn_server(config: ServerConfig, sink: Arc<RecordingSink>) -> SocketAddr {
    let state = AppState::with_metrics(config, sink).unwrap();
    let app = routes::create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}
