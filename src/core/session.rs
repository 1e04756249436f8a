//! Per-call relay state
//!
//! [`CallSession`] turns frames from either peer into [`RelayAction`]s and
//! latency samples. It performs no I/O; the relay loop in
//! [`crate::core::relay`] owns one session per call and executes the actions.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::metrics::{LatencyMetric, MetricsSink, decoded_len};
use super::realtime::{ClientEvent, ServerEvent};
use super::telephony::{TelephonyInbound, mark_frame, media_frame};
use super::turn::{AudioTransition, TurnClosed, TurnTracker, elapsed_ms};
use crate::errors::RelayResult;

/// Side effect requested by the session
#[derive(Debug, Clone, PartialEq)]
pub enum RelayAction {
    /// Send a text frame to the realtime API
    SendRealtime(String),
    /// Send a text frame to the telephony edge
    SendTelephony(String),
    /// Start measuring round trips on the telephony connection
    StartTelephonyProbe,
    /// A first-audio marker was acknowledged
    TurnCompleted(TurnSummary),
}

/// Latency summary for one acknowledged turn, in whole milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnSummary {
    pub turn: u64,
    #[serde(rename = "streamSid")]
    pub stream_sid: Option<String>,
    pub felt_latency_ms: i64,
    pub ttfb_ms: Option<i64>,
    pub e2e_first_byte_ms: Option<i64>,
}

/// Outstanding first-audio marker with a snapshot of its turn's timing
#[derive(Debug, Clone)]
struct FirstAudioMarker {
    name: String,
    turn_id: u64,
    speech_stopped_at: Instant,
    user_stop_at: Option<Instant>,
    ttfb_ms: Option<f64>,
    e2e_ms: Option<f64>,
}

/// State of one call, owned by its relay task
pub struct CallSession {
    stream_sid: Option<String>,
    /// Server clock at stream start
    anchor: Option<Instant>,
    /// Latest telephony media timestamp, ms since stream start
    last_media_ts: u64,
    tracker: TurnTracker,
    marker: Option<FirstAudioMarker>,
    metrics: Arc<dyn MetricsSink>,
}

impl CallSession {
    pub fn new(metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            stream_sid: None,
            anchor: None,
            last_media_ts: 0,
            tracker: TurnTracker::new(),
            marker: None,
            metrics,
        }
    }

    pub fn stream_sid(&self) -> Option<&str> {
        self.stream_sid.as_deref()
    }

    /// Handle a text frame from the telephony edge
    ///
    /// Media is only relayed while `realtime_open` is true; otherwise it is
    /// dropped without being counted.
    pub fn on_telephony_frame(
        &mut self,
        text: &str,
        received_at: Instant,
        realtime_open: bool,
    ) -> Vec<RelayAction> {
        let event = match serde_json::from_str::<TelephonyInbound>(text) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, len = text.len(), "Discarding malformed telephony frame");
                return Vec::new();
            }
        };

        match event {
            TelephonyInbound::Media { media } => {
                if !realtime_open {
                    trace!("Realtime connection not open, dropping media");
                    return Vec::new();
                }

                let bytes = decoded_len(&media.payload);
                if let Some(timestamp) = media.timestamp {
                    self.last_media_ts = self.last_media_ts.max(timestamp);
                }

                match encode_realtime(ClientEvent::InputAudioBufferAppend {
                    audio: media.payload,
                }) {
                    Ok(frame) => {
                        self.metrics.add_bytes_in(bytes);
                        vec![RelayAction::SendRealtime(frame)]
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to encode audio append");
                        Vec::new()
                    }
                }
            }
            TelephonyInbound::Start { start } => {
                info!(
                    stream_sid = %start.stream_sid,
                    call_sid = start.call_sid.as_deref().unwrap_or_default(),
                    "Incoming stream has started"
                );
                self.stream_sid = Some(start.stream_sid);
                self.anchor = Some(received_at);
                self.last_media_ts = 0;
                vec![RelayAction::StartTelephonyProbe]
            }
            TelephonyInbound::Mark { mark } => self
                .acknowledge_marker(&mark.name, received_at)
                .map(RelayAction::TurnCompleted)
                .into_iter()
                .collect(),
            TelephonyInbound::Stop { stream_sid } => {
                info!(stream_sid = stream_sid.as_deref().unwrap_or_default(), "Stream stopped");
                Vec::new()
            }
            other => {
                debug!(event = other.kind(), "Received non-media event");
                Vec::new()
            }
        }
    }

    /// Handle a text frame from the realtime API
    pub fn on_realtime_frame(&mut self, text: &str, received_at: Instant) -> Vec<RelayAction> {
        let event = match serde_json::from_str::<ServerEvent>(text) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, len = text.len(), "Discarding malformed realtime frame");
                return Vec::new();
            }
        };

        match event {
            ServerEvent::SpeechStopped { .. } => {
                let user_stop_at = self.user_stop_estimate();
                let opened = self.tracker.speech_stopped(received_at, user_stop_at);
                if let Some(superseded) = opened.superseded {
                    info!(
                        turn = opened.turn_id,
                        superseded, "Discarding unterminated turn"
                    );
                } else {
                    debug!(turn = opened.turn_id, "Turn opened");
                }
                Vec::new()
            }
            ServerEvent::OutputAudioDelta { delta, .. } => self.on_audio_delta(delta, received_at),
            ServerEvent::ResponseDone { .. } => {
                match self.tracker.response_complete() {
                    TurnClosed::Completed { turn_id, stream_ms } => {
                        self.metrics
                            .observe_latency(LatencyMetric::ResponseStream, stream_ms);
                        debug!(turn = turn_id, stream_ms, "Response complete");
                    }
                    TurnClosed::Silent { turn_id } => {
                        debug!(turn = turn_id, "Response complete without audio");
                    }
                    TurnClosed::NoTurn => trace!("Response complete with no open turn"),
                }
                Vec::new()
            }
            ServerEvent::Error { error } => {
                let (code, message) = error
                    .map(|e| (e.code, e.message))
                    .unwrap_or_default();
                info!(
                    code = code.as_deref().unwrap_or_default(),
                    message = message.as_deref().unwrap_or_default(),
                    "Realtime API reported an error"
                );
                Vec::new()
            }
            event if event.is_diagnostic() => {
                info!(event = event.kind(), "Received realtime event");
                Vec::new()
            }
            event => {
                trace!(event = event.kind(), "Ignoring realtime event");
                Vec::new()
            }
        }
    }

    fn on_audio_delta(&mut self, delta: String, received_at: Instant) -> Vec<RelayAction> {
        if let AudioTransition::FirstAudio { turn, ttfb_ms } = self.tracker.audio_chunk(received_at)
        {
            self.metrics.observe_latency(LatencyMetric::Ttfb, ttfb_ms);
            debug!(turn = turn.id, ttfb_ms, "First response audio");
        }

        let Some(stream_sid) = self.stream_sid.clone() else {
            debug!("Response audio before stream start, not forwarded");
            return Vec::new();
        };

        let media = match media_frame(&stream_sid, &delta) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Failed to encode media frame");
                return Vec::new();
            }
        };
        self.metrics.add_bytes_out(decoded_len(&delta));
        let mut actions = vec![RelayAction::SendTelephony(media)];

        let forwarded_at = Instant::now();
        if let Some(turn) = self.tracker.first_forwarded(forwarded_at) {
            let e2e_ms = elapsed_ms(turn.speech_stopped_at, forwarded_at);
            self.metrics.observe_latency(LatencyMetric::E2eReply, e2e_ms);

            let name = format!("first-audio-{}-{}", turn.id, unix_millis());
            match mark_frame(&stream_sid, &name) {
                Ok(frame) => {
                    if let Some(previous) = self.marker.take() {
                        debug!(marker = %previous.name, "Superseding unacknowledged marker");
                    }
                    self.marker = Some(FirstAudioMarker {
                        name,
                        turn_id: turn.id,
                        speech_stopped_at: turn.speech_stopped_at,
                        user_stop_at: turn.user_stop_at,
                        ttfb_ms: turn
                            .first_byte_at
                            .map(|first| elapsed_ms(turn.speech_stopped_at, first)),
                        e2e_ms: Some(e2e_ms),
                    });
                    actions.push(RelayAction::SendTelephony(frame));
                }
                Err(e) => warn!(error = %e, "Failed to encode mark frame"),
            }
        }

        actions
    }

    fn acknowledge_marker(&mut self, name: &str, ack_at: Instant) -> Option<TurnSummary> {
        let Some(marker) = self.marker.take_if(|marker| marker.name == name) else {
            debug!(marker = name, "Ignoring unmatched mark");
            return None;
        };

        let felt_ms = elapsed_ms(
            marker.user_stop_at.unwrap_or(marker.speech_stopped_at),
            ack_at,
        );
        self.metrics.observe_latency(LatencyMetric::Felt, felt_ms);

        Some(TurnSummary {
            turn: marker.turn_id,
            stream_sid: self.stream_sid.clone(),
            felt_latency_ms: felt_ms.round() as i64,
            ttfb_ms: marker.ttfb_ms.map(|ms| ms.round() as i64),
            e2e_first_byte_ms: marker.e2e_ms.map(|ms| ms.round() as i64),
        })
    }

    /// Caller's end of speech on the server clock: anchor + media elapsed time
    fn user_stop_estimate(&self) -> Option<Instant> {
        self.anchor
            .map(|anchor| anchor + Duration::from_millis(self.last_media_ts))
    }
}

fn encode_realtime(event: ClientEvent) -> RelayResult<String> {
    Ok(serde_json::to_string(&event)?)
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
