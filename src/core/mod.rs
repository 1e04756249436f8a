pub mod metrics;
pub mod peer;
pub mod realtime;
pub mod relay;
pub mod session;
pub mod telephony;
pub mod turn;

// Re-export commonly used types for convenience
pub use metrics::{LatencyMetric, MetricsSink, PrometheusMetrics};
pub use peer::{PeerConnection, PeerEvent, PeerEventKind, PeerSide};
pub use realtime::{RealtimeConnector, RealtimeSocket};
pub use relay::run_call;
pub use session::{CallSession, RelayAction, TurnSummary};
pub use turn::{AudioTransition, TurnClosed, TurnOpened, TurnTracker};
