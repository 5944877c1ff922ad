//! Buffer sizing and flush cadence for the telemetry emitter.

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub sidecar_url: Option<String>,
    pub api_key: Option<String>,
    /// Flush as soon as either buffer reaches this many events.
    pub batch_size: usize,
    /// Flush on this cadence even if the batch size hasn't been reached.
    pub flush_interval_secs: u64,
    /// Per-buffer capacity; oldest events are dropped on overflow.
    pub buffer_size: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sidecar_url: None,
            api_key: None,
            batch_size: 100,
            flush_interval_secs: 5,
            buffer_size: 1000,
        }
    }
}

impl From<&acvps_config::MetricsConfig> for TelemetryConfig {
    fn from(metrics: &acvps_config::MetricsConfig) -> Self {
        Self {
            enabled: metrics.enabled,
            sidecar_url: metrics.service_url.clone(),
            api_key: None,
            batch_size: metrics.batch_size,
            flush_interval_secs: metrics.batch_interval_secs,
            buffer_size: metrics.buffer_size,
        }
    }
}
