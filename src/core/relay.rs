//! Call relay loop
//!
//! One task per call. It owns both peer connections and the
//! [`CallSession`], consumes their events strictly in arrival order and
//! executes the resulting actions. Either connection ending tears down the
//! other.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{Sink, Stream};
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use super::metrics::{LatencyMetric, MetricsSink};
use super::peer::{PeerConnection, PeerEventKind, PeerSide, WireMessage};
use super::session::{CallSession, RelayAction};
use crate::state::AppState;

/// Event queue shared by both connections of a call
const EVENT_CAPACITY: usize = 1024;

/// Relay one call until either side disconnects
///
/// `socket` is the accepted telephony connection. A connection to the
/// realtime API is opened for the call; if that fails the telephony
/// connection is closed.
pub async fn run_call<S, M, E>(socket: S, state: Arc<AppState>)
where
    S: Stream<Item = Result<M, E>> + Sink<M, Error = E> + Send + Unpin + 'static,
    M: WireMessage,
    E: fmt::Display + Send + 'static,
{
    let call_id = Uuid::new_v4();
    relay(socket, state)
        .instrument(info_span!("call", %call_id))
        .await
}

async fn relay<S, M, E>(socket: S, state: Arc<AppState>)
where
    S: Stream<Item = Result<M, E>> + Sink<M, Error = E> + Send + Unpin + 'static,
    M: WireMessage,
    E: fmt::Display + Send + 'static,
{
    info!("Telephony client connected");

    let (events_tx, mut events_rx) = mpsc::channel(EVENT_CAPACITY);
    let telephony = PeerConnection::spawn(PeerSide::Telephony, socket, events_tx.clone());

    let realtime_socket = match state.realtime.connect().await {
        Ok(socket) => socket,
        Err(e) => {
            error!(error = %e, "Failed to connect to realtime API");
            telephony.close();
            return;
        }
    };
    let realtime = PeerConnection::spawn(PeerSide::Realtime, realtime_socket, events_tx);
    let realtime_opened_at = Instant::now();

    let probe_interval = Duration::from_millis(state.config.relay.liveness_probe_interval_ms);
    realtime.start_liveness_probe(
        probe_interval,
        rtt_observer(state.metrics.clone(), LatencyMetric::RealtimeRtt),
    );

    let mut session = CallSession::new(state.metrics.clone());

    let settle = tokio::time::sleep(Duration::from_millis(
        state.config.relay.session_update_delay_ms,
    ));
    tokio::pin!(settle);
    let mut session_update_sent = false;

    loop {
        tokio::select! {
            _ = &mut settle, if !session_update_sent => {
                session_update_sent = true;
                match serde_json::to_string(&state.realtime.session_update()) {
                    Ok(frame) => {
                        if realtime.send_text(frame) {
                            info!("Sent session.update");
                        }
                    }
                    Err(e) => error!(error = %e, "Failed to encode session.update"),
                }
            }

            event = events_rx.recv() => {
                let Some(event) = event else {
                    break;
                };

                match event.kind {
                    PeerEventKind::Text(text) => {
                        let actions = match event.side {
                            PeerSide::Telephony => {
                                // Audio that arrived before the realtime socket opened is dropped
                                let realtime_open =
                                    realtime.is_open() && event.received_at >= realtime_opened_at;
                                session.on_telephony_frame(&text, event.received_at, realtime_open)
                            }
                            PeerSide::Realtime => session.on_realtime_frame(&text, event.received_at),
                        };
                        execute(actions, &telephony, &realtime, &state, probe_interval);
                    }
                    PeerEventKind::Closed => {
                        info!(side = %event.side, "Connection closed");
                        break;
                    }
                    PeerEventKind::Error(e) => {
                        warn!(side = %event.side, error = %e, "Connection error");
                        break;
                    }
                }
            }
        }
    }

    telephony.close();
    realtime.close();
    info!(
        stream_sid = session.stream_sid().unwrap_or_default(),
        "Call ended"
    );
}

fn execute(
    actions: Vec<RelayAction>,
    telephony: &PeerConnection,
    realtime: &PeerConnection,
    state: &AppState,
    probe_interval: Duration,
) {
    for action in actions {
        match action {
            RelayAction::SendRealtime(frame) => {
                realtime.send_text(frame);
            }
            RelayAction::SendTelephony(frame) => {
                telephony.send_text(frame);
            }
            RelayAction::StartTelephonyProbe => {
                debug!("Starting telephony liveness probe");
                telephony.start_liveness_probe(
                    probe_interval,
                    rtt_observer(state.metrics.clone(), LatencyMetric::TelephonyRtt),
                );
            }
            RelayAction::TurnCompleted(summary) => match serde_json::to_string(&summary) {
                Ok(json) => info!(summary = %json, "Turn summary"),
                Err(e) => warn!(error = %e, turn = summary.turn, "Failed to encode turn summary"),
            },
        }
    }
}

fn rtt_observer(
    metrics: Arc<dyn MetricsSink>,
    metric: LatencyMetric,
) -> impl Fn(f64) + Send + Sync + 'static {
    move |rtt_ms| metrics.observe_latency(metric, rtt_ms)
}
