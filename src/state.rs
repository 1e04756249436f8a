use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::metrics::{MetricsSink, PrometheusMetrics};
use crate::core::realtime::RealtimeConnector;
use crate::errors::RelayResult;

/// Application state shared by every request and call
pub struct AppState {
    pub config: ServerConfig,
    /// Process-wide metrics, written by calls and read by `/metrics`
    pub metrics: Arc<dyn MetricsSink>,
    pub realtime: RealtimeConnector,
}

impl AppState {
    /// Build state backed by a fresh Prometheus registry
    pub fn new(config: ServerConfig) -> RelayResult<Arc<Self>> {
        let metrics: Arc<dyn MetricsSink> = Arc::new(PrometheusMetrics::new()?);
        Self::with_metrics(config, metrics)
    }

    /// Build state around an existing metrics sink
    pub fn with_metrics(
        config: ServerConfig,
        metrics: Arc<dyn MetricsSink>,
    ) -> RelayResult<Arc<Self>> {
        let realtime = RealtimeConnector::from_config(&config)?;
        Ok(Arc::new(Self {
            config,
            metrics,
            realtime,
        }))
    }
}
