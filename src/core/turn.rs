//! Per-call turn state machine
//!
//! One turn spans "user stopped speaking" to "response complete". The tracker
//! holds at most one open turn and reports every transition as a tagged value
//! so the relay can log and measure without peeking at internal state.

use std::time::Instant;

/// Timing of one open turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Turn {
    pub id: u64,
    /// Server clock when the AI peer reported end of user speech
    pub speech_stopped_at: Instant,
    /// Telephony-clock estimate of end of speech, re-based onto the server clock
    pub user_stop_at: Option<Instant>,
    pub first_byte_at: Option<Instant>,
    pub first_forwarded_at: Option<Instant>,
    pub last_byte_at: Option<Instant>,
}

impl Turn {
    fn new(id: u64, speech_stopped_at: Instant, user_stop_at: Option<Instant>) -> Self {
        Self {
            id,
            speech_stopped_at,
            user_stop_at,
            first_byte_at: None,
            first_forwarded_at: None,
            last_byte_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnState {
    Idle,
    AwaitingFirstAudio(Turn),
    Streaming(Turn),
}

/// Outcome of a speech-stopped event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnOpened {
    pub turn_id: u64,
    /// Id of an unterminated turn that was discarded without measurements
    pub superseded: Option<u64>,
}

/// Outcome of a response audio chunk
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioTransition {
    /// First chunk of the open turn
    FirstAudio { turn: Turn, ttfb_ms: f64 },
    /// Later chunk of the open turn
    Continued { turn_id: u64 },
    /// No turn is open; audio is still relayed but not measured
    Untracked,
}

/// Outcome of a response-complete event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TurnClosed {
    /// Audio was produced; `stream_ms` is last byte minus first byte
    Completed { turn_id: u64, stream_ms: f64 },
    /// The turn closed without any audio
    Silent { turn_id: u64 },
    /// Nothing was open
    NoTurn,
}

#[derive(Debug)]
pub struct TurnTracker {
    state: TurnState,
    next_id: u64,
}

impl Default for TurnTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnTracker {
    pub fn new() -> Self {
        Self {
            state: TurnState::Idle,
            next_id: 1,
        }
    }

    /// Currently open turn, if any
    pub fn current(&self) -> Option<&Turn> {
        match &self.state {
            TurnState::Idle => None,
            TurnState::AwaitingFirstAudio(turn) | TurnState::Streaming(turn) => Some(turn),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, TurnState::Idle)
    }

    /// Open a new turn, discarding any turn still in flight
    pub fn speech_stopped(&mut self, at: Instant, user_stop_at: Option<Instant>) -> TurnOpened {
        let superseded = self.current().map(|turn| turn.id);
        let turn_id = self.next_id;
        self.next_id += 1;
        self.state = TurnState::AwaitingFirstAudio(Turn::new(turn_id, at, user_stop_at));
        TurnOpened {
            turn_id,
            superseded,
        }
    }

    /// Advance on a response audio chunk received at `at`
    pub fn audio_chunk(&mut self, at: Instant) -> AudioTransition {
        match &mut self.state {
            TurnState::Idle => AudioTransition::Untracked,
            TurnState::AwaitingFirstAudio(turn) => {
                let mut turn = *turn;
                turn.first_byte_at = Some(at);
                turn.last_byte_at = Some(at);
                let ttfb_ms = elapsed_ms(turn.speech_stopped_at, at);
                self.state = TurnState::Streaming(turn);
                AudioTransition::FirstAudio { turn, ttfb_ms }
            }
            TurnState::Streaming(turn) => {
                turn.last_byte_at = Some(at);
                AudioTransition::Continued { turn_id: turn.id }
            }
        }
    }

    /// Record when a chunk of the open turn was handed to the telephony peer
    ///
    /// Returns the turn only for the first forwarded chunk, which may come
    /// after the turn's first received chunk when early audio was held back.
    pub fn first_forwarded(&mut self, at: Instant) -> Option<Turn> {
        match &mut self.state {
            TurnState::Streaming(turn) if turn.first_forwarded_at.is_none() => {
                turn.first_forwarded_at = Some(at);
                Some(*turn)
            }
            _ => None,
        }
    }

    /// Close the open turn, returning to idle regardless of progress
    pub fn response_complete(&mut self) -> TurnClosed {
        let state = std::mem::replace(&mut self.state, TurnState::Idle);
        match state {
            TurnState::Idle => TurnClosed::NoTurn,
            TurnState::AwaitingFirstAudio(turn) => TurnClosed::Silent { turn_id: turn.id },
            TurnState::Streaming(turn) => match (turn.first_byte_at, turn.last_byte_at) {
                (Some(first), Some(last)) => TurnClosed::Completed {
                    turn_id: turn.id,
                    stream_ms: elapsed_ms(first, last),
                },
                _ => TurnClosed::Silent { turn_id: turn.id },
            },
        }
    }
}

/// Signed difference `to - from` in milliseconds
pub fn elapsed_ms(from: Instant, to: Instant) -> f64 {
    if to >= from {
        to.duration_since(from).as_nanos() as f64 / 1_000_000.0
    } else {
        -(from.duration_since(to).as_nanos() as f64 / 1_000_000.0)
    }
}
