//! Peer connection wrapper
//!
//! Wraps one WebSocket (the telephony edge or the realtime API) in a task
//! that moves frames between the socket and two channels:
//! - an outbound queue fed by non-blocking [`PeerConnection::send_text`]
//! - an inbound [`PeerEvent`] stream consumed by the call's relay loop
//!
//! The same wrapper drives both axum server sockets and tokio-tungstenite
//! client sockets through the [`WireMessage`] conversion.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Outbound queue capacity per connection
const OUTBOUND_CAPACITY: usize = 256;

/// Protocol-neutral WebSocket frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close,
}

/// Conversion between a socket's native message type and [`Frame`]
pub trait WireMessage: Sized + Send + Unpin + 'static {
    /// `None` for message kinds with no [`Frame`] counterpart
    fn into_frame(self) -> Option<Frame>;
    fn from_frame(frame: Frame) -> Self;
}

impl WireMessage for axum::extract::ws::Message {
    fn into_frame(self) -> Option<Frame> {
        use axum::extract::ws::Message;
        Some(match self {
            Message::Text(text) => Frame::Text(text.to_string()),
            Message::Binary(data) => Frame::Binary(data),
            Message::Ping(data) => Frame::Ping(data),
            Message::Pong(data) => Frame::Pong(data),
            Message::Close(_) => Frame::Close,
        })
    }

    fn from_frame(frame: Frame) -> Self {
        use axum::extract::ws::Message;
        match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(data) => Message::Binary(data),
            Frame::Ping(data) => Message::Ping(data),
            Frame::Pong(data) => Message::Pong(data),
            Frame::Close => Message::Close(None),
        }
    }
}

impl WireMessage for tungstenite::Message {
    fn into_frame(self) -> Option<Frame> {
        use tungstenite::Message;
        match self {
            Message::Text(text) => Some(Frame::Text(text.to_string())),
            Message::Binary(data) => Some(Frame::Binary(data)),
            Message::Ping(data) => Some(Frame::Ping(data)),
            Message::Pong(data) => Some(Frame::Pong(data)),
            Message::Close(_) => Some(Frame::Close),
            Message::Frame(_) => None,
        }
    }

    fn from_frame(frame: Frame) -> Self {
        use tungstenite::Message;
        match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(data) => Message::Binary(data),
            Frame::Ping(data) => Message::Ping(data),
            Frame::Pong(data) => Message::Pong(data),
            Frame::Close => Message::Close(None),
        }
    }
}

/// Which side of the call a connection belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerSide {
    Telephony,
    Realtime,
}

impl fmt::Display for PeerSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerSide::Telephony => write!(f, "telephony"),
            PeerSide::Realtime => write!(f, "realtime"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEventKind {
    Text(String),
    Closed,
    Error(String),
}

/// One inbound occurrence on a connection, stamped on arrival
#[derive(Debug, Clone)]
pub struct PeerEvent {
    pub side: PeerSide,
    pub kind: PeerEventKind,
    pub received_at: Instant,
}

type RttObserver = Arc<dyn Fn(f64) + Send + Sync>;

struct ActiveProbe {
    generation: u64,
    token: CancellationToken,
    observe: RttObserver,
    next_seq: u64,
    /// Most recent unanswered ping
    pending: Option<(u64, tokio::time::Instant)>,
}

/// Handle to one spawned connection
///
/// Cloning yields another handle to the same connection.
#[derive(Clone)]
pub struct PeerConnection {
    side: PeerSide,
    outbound: mpsc::Sender<Frame>,
    open: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
    cancel: CancellationToken,
    probe: Arc<Mutex<Option<ActiveProbe>>>,
    probe_generation: Arc<AtomicU64>,
}

impl fmt::Debug for PeerConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerConnection")
            .field("side", &self.side)
            .field("open", &self.is_open())
            .finish()
    }
}

impl PeerConnection {
    /// Take ownership of `socket` and start moving frames
    ///
    /// Text frames, closes and errors are delivered to `events` in arrival
    /// order. After a close or error is delivered nothing more is sent for
    /// this connection.
    pub fn spawn<S, M, E>(side: PeerSide, socket: S, events: mpsc::Sender<PeerEvent>) -> Self
    where
        S: Stream<Item = Result<M, E>> + Sink<M, Error = E> + Send + Unpin + 'static,
        M: WireMessage,
        E: fmt::Display + Send + 'static,
    {
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let connection = Self {
            side,
            outbound,
            open: Arc::new(AtomicBool::new(true)),
            closed: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            probe: Arc::new(Mutex::new(None)),
            probe_generation: Arc::new(AtomicU64::new(0)),
        };

        tokio::spawn(connection.clone().run(socket, outbound_rx, events));
        connection
    }

    pub fn side(&self) -> PeerSide {
        self.side
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Queue a text frame without waiting
    ///
    /// Returns `false` when the frame was dropped because the connection is
    /// not open or its outbound queue is full.
    pub fn send_text(&self, text: String) -> bool {
        if !self.is_open() {
            trace!(side = %self.side, "Dropping frame for closed connection");
            return false;
        }

        match self.outbound.try_send(Frame::Text(text)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(side = %self.side, "Outbound queue full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Close the connection
    ///
    /// Safe to call repeatedly; only the first call stops the liveness probe
    /// and sends a close frame.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(side = %self.side, "Closing connection");
        self.open.store(false, Ordering::SeqCst);
        self.cancel.cancel();
    }

    /// Ping the peer every `interval` and report round trips to `observe`
    ///
    /// Each ping carries a sequence number; only the pong for the latest
    /// ping is measured. Starting a probe replaces any running one.
    pub fn start_liveness_probe<F>(&self, interval: Duration, observe: F)
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        if !self.is_open() {
            return;
        }

        let generation = self.probe_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = self.cancel.child_token();
        {
            let mut probe = self.probe.lock();
            if let Some(previous) = probe.take() {
                previous.token.cancel();
            }
            *probe = Some(ActiveProbe {
                generation,
                token: token.clone(),
                observe: Arc::new(observe),
                next_seq: 0,
                pending: None,
            });
        }

        let connection = self.clone();
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if !connection.send_probe(generation) {
                            break;
                        }
                    }
                }
            }
            trace!(side = %connection.side, generation, "Liveness probe stopped");
        });
    }

    /// Send one ping for probe `generation`; `false` once that probe is gone
    fn send_probe(&self, generation: u64) -> bool {
        if !self.is_open() {
            return false;
        }

        let seq = {
            let mut probe = self.probe.lock();
            let Some(active) = probe.as_mut().filter(|p| p.generation == generation) else {
                return false;
            };
            let seq = active.next_seq;
            active.next_seq += 1;
            active.pending = Some((seq, tokio::time::Instant::now()));
            seq
        };

        let payload = Bytes::copy_from_slice(&seq.to_be_bytes());
        if self.outbound.try_send(Frame::Ping(payload)).is_err() {
            debug!(side = %self.side, seq, "Liveness ping dropped");
        }
        true
    }

    fn on_pong(&self, payload: &[u8]) {
        let Ok(bytes) = <[u8; 8]>::try_from(payload) else {
            return;
        };
        let seq = u64::from_be_bytes(bytes);

        let measured = {
            let mut probe = self.probe.lock();
            match probe.as_mut() {
                Some(active) if active.pending.map(|(s, _)| s) == Some(seq) => active
                    .pending
                    .take()
                    .map(|(_, sent_at)| (active.observe.clone(), sent_at.elapsed())),
                _ => None,
            }
        };

        if let Some((observe, rtt)) = measured {
            trace!(side = %self.side, seq, rtt_ms = rtt.as_secs_f64() * 1000.0, "Liveness pong");
            observe(rtt.as_secs_f64() * 1000.0);
        }
    }

    async fn run<S, M, E>(
        self,
        socket: S,
        mut outbound_rx: mpsc::Receiver<Frame>,
        events: mpsc::Sender<PeerEvent>,
    ) where
        S: Stream<Item = Result<M, E>> + Sink<M, Error = E> + Send + Unpin + 'static,
        M: WireMessage,
        E: fmt::Display + Send + 'static,
    {
        let (mut sink, mut stream) = socket.split();

        let terminal = loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    if let Err(e) = sink.send(M::from_frame(Frame::Close)).await {
                        trace!(side = %self.side, "Close frame not delivered: {}", e);
                    }
                    break None;
                }

                Some(frame) = outbound_rx.recv() => {
                    if let Err(e) = sink.send(M::from_frame(frame)).await {
                        break Some(PeerEventKind::Error(e.to_string()));
                    }
                }

                msg = stream.next() => {
                    let received_at = Instant::now();
                    match msg.map(|r| r.map(M::into_frame)) {
                        Some(Ok(Some(Frame::Text(text)))) => {
                            let event = PeerEvent {
                                side: self.side,
                                kind: PeerEventKind::Text(text),
                                received_at,
                            };
                            if events.send(event).await.is_err() {
                                break None;
                            }
                        }
                        Some(Ok(Some(Frame::Pong(payload)))) => self.on_pong(&payload),
                        Some(Ok(Some(Frame::Close))) | None => break Some(PeerEventKind::Closed),
                        Some(Ok(Some(Frame::Binary(data)))) => {
                            debug!(side = %self.side, len = data.len(), "Ignoring binary frame");
                        }
                        // Pings are answered by the protocol layer
                        Some(Ok(_)) => {}
                        Some(Err(e)) => break Some(PeerEventKind::Error(e.to_string())),
                    }
                }
            }
        };

        self.open.store(false, Ordering::SeqCst);
        self.cancel.cancel();

        if let Some(kind) = terminal {
            debug!(side = %self.side, ?kind, "Connection ended");
            let _ = events
                .send(PeerEvent {
                    side: self.side,
                    kind,
                    received_at: Instant::now(),
                })
                .await;
        }
    }
}
