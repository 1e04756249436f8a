//! Process-wide metrics sink
//!
//! Byte throughput counters and latency histograms shared by every call.
//! [`PrometheusMetrics`] owns its own recorder instead of installing a global
//! one, so several sinks can live in one process (one per server in tests).
//! Process metrics (`process_*`) are sampled into that recorder on each render.

use metrics::{Counter, Histogram, Unit};
use metrics_exporter_prometheus::{
    Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder,
};
use metrics_process::Collector;

use crate::errors::{RelayError, RelayResult};

/// Counter of base64-decoded telephony audio bytes relayed to the AI peer
pub const BYTES_IN_TOTAL: &str = "twilio_audio_bytes_in_total";

/// Counter of base64-decoded AI audio bytes relayed to the telephony peer
pub const BYTES_OUT_TOTAL: &str = "twilio_audio_bytes_out_total";

const REPLY_BUCKETS: &[f64] = &[
    50.0, 100.0, 200.0, 300.0, 500.0, 800.0, 1200.0, 2000.0, 3000.0, 5000.0,
];
const STREAM_BUCKETS: &[f64] = &[100.0, 300.0, 600.0, 1000.0, 2000.0, 4000.0, 8000.0];
const RTT_BUCKETS: &[f64] = &[10.0, 20.0, 50.0, 100.0, 200.0, 400.0, 800.0, 1600.0];
const FELT_BUCKETS: &[f64] = &[
    100.0, 200.0, 300.0, 500.0, 800.0, 1200.0, 2000.0, 3000.0, 5000.0,
];

/// Latency distributions recorded by the relay, all in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LatencyMetric {
    /// speech stopped → first response audio byte received
    Ttfb,
    /// speech stopped → first response audio forwarded to telephony
    E2eReply,
    /// first → last response audio byte of one response
    ResponseStream,
    /// user stop estimate → telephony playback acknowledgment
    Felt,
    /// liveness round trip on the AI connection
    RealtimeRtt,
    /// liveness round trip on the telephony connection
    TelephonyRtt,
}

impl LatencyMetric {
    pub const ALL: [LatencyMetric; 6] = [
        LatencyMetric::Ttfb,
        LatencyMetric::E2eReply,
        LatencyMetric::ResponseStream,
        LatencyMetric::Felt,
        LatencyMetric::RealtimeRtt,
        LatencyMetric::TelephonyRtt,
    ];

    /// Exposition name of the histogram
    pub fn name(self) -> &'static str {
        match self {
            LatencyMetric::Ttfb => "openai_ttfb_ms",
            LatencyMetric::E2eReply => "e2e_reply_latency_ms",
            LatencyMetric::ResponseStream => "response_stream_duration_ms",
            LatencyMetric::Felt => "felt_latency_ms",
            LatencyMetric::RealtimeRtt => "ws_rtt_openai_ms",
            LatencyMetric::TelephonyRtt => "ws_rtt_twilio_ms",
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            LatencyMetric::Ttfb => "Time from speech_stopped to first response audio byte",
            LatencyMetric::E2eReply => {
                "Time from speech_stopped to first response audio forwarded to the caller"
            }
            LatencyMetric::ResponseStream => "Time from first to last response audio byte",
            LatencyMetric::Felt => "Time from caller speech end to playback acknowledgment",
            LatencyMetric::RealtimeRtt => "WebSocket ping round trip to the realtime API",
            LatencyMetric::TelephonyRtt => "WebSocket ping round trip to the telephony edge",
        }
    }

    /// Upper bucket boundaries
    pub fn buckets(self) -> &'static [f64] {
        match self {
            LatencyMetric::Ttfb | LatencyMetric::E2eReply => REPLY_BUCKETS,
            LatencyMetric::ResponseStream => STREAM_BUCKETS,
            LatencyMetric::Felt => FELT_BUCKETS,
            LatencyMetric::RealtimeRtt | LatencyMetric::TelephonyRtt => RTT_BUCKETS,
        }
    }
}

/// Shared aggregation point for relay measurements
///
/// Implementations must be safe to call concurrently from every call task.
pub trait MetricsSink: Send + Sync {
    /// Add to the inbound (telephony → AI) byte counter
    fn add_bytes_in(&self, bytes: u64);

    /// Add to the outbound (AI → telephony) byte counter
    fn add_bytes_out(&self, bytes: u64);

    /// Record one latency sample in milliseconds
    fn observe_latency(&self, metric: LatencyMetric, value_ms: f64);

    /// Render the current state in Prometheus text exposition format
    fn render(&self) -> String;
}

/// Prometheus-backed [`MetricsSink`]
pub struct PrometheusMetrics {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
    process: Collector,
    bytes_in: Counter,
    bytes_out: Counter,
    histograms: [Histogram; 6],
}

impl PrometheusMetrics {
    /// Build a sink with its own registry and the fixed bucket layout
    pub fn new() -> RelayResult<Self> {
        let mut builder = PrometheusBuilder::new();
        for metric in LatencyMetric::ALL {
            builder = builder
                .set_buckets_for_metric(Matcher::Full(metric.name().to_string()), metric.buckets())
                .map_err(|e| {
                    RelayError::MetricsError(format!("invalid buckets for {}: {e}", metric.name()))
                })?;
        }
        let recorder = builder.build_recorder();
        let handle = recorder.handle();
        let process = Collector::default();

        let (bytes_in, bytes_out, histograms) = metrics::with_local_recorder(&recorder, || {
            metrics::describe_counter!(
                BYTES_IN_TOTAL,
                Unit::Bytes,
                "Audio bytes received from the telephony edge"
            );
            metrics::describe_counter!(
                BYTES_OUT_TOTAL,
                Unit::Bytes,
                "Audio bytes sent to the telephony edge"
            );
            for metric in LatencyMetric::ALL {
                metrics::describe_histogram!(metric.name(), Unit::Milliseconds, metric.help());
            }
            process.describe();

            (
                metrics::counter!(BYTES_IN_TOTAL),
                metrics::counter!(BYTES_OUT_TOTAL),
                LatencyMetric::ALL.map(|metric| metrics::histogram!(metric.name())),
            )
        });

        Ok(Self {
            recorder,
            handle,
            process,
            bytes_in,
            bytes_out,
            histograms,
        })
    }

    fn histogram(&self, metric: LatencyMetric) -> &Histogram {
        // ALL lists the variants in declaration order
        &self.histograms[metric as usize]
    }
}

impl MetricsSink for PrometheusMetrics {
    fn add_bytes_in(&self, bytes: u64) {
        self.bytes_in.increment(bytes);
    }

    fn add_bytes_out(&self, bytes: u64) {
        self.bytes_out.increment(bytes);
    }

    fn observe_latency(&self, metric: LatencyMetric, value_ms: f64) {
        self.histogram(metric).record(value_ms);
    }

    fn render(&self) -> String {
        metrics::with_local_recorder(&self.recorder, || self.process.collect());
        self.handle.render()
    }
}

impl std::fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMetrics").finish_non_exhaustive()
    }
}

/// Decoded size of a base64 payload, as `floor(len * 0.75)`
///
/// Padding is not subtracted; the counters approximate raw audio volume.
pub fn decoded_len(base64_payload: &str) -> u64 {
    (base64_payload.len() as u64 * 3) / 4
}
