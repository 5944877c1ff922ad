//! The telemetry engine: a process-wide evidence buffer plus a
//! background flusher that POSTs batches to the sidecar on a fixed
//! cadence or as soon as a buffer fills.

use std::sync::Arc;
use std::time::Duration;

use acvps_core::evidence::{RequestEvent, ViolationEvent};
use reqwest::Client;
use serde::Serialize;

use crate::buffer::EvidenceBuffer;
use crate::config::TelemetryConfig;

#[derive(Debug, Serialize)]
struct FlushBatch<'a> {
    requests: &'a [RequestEvent],
    violations: &'a [ViolationEvent],
}

pub struct TelemetryEngine {
    config: TelemetryConfig,
    buffer: EvidenceBuffer,
    client: Client,
}

impl TelemetryEngine {
    pub fn new(config: TelemetryConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("reqwest client builder with only timeout set cannot fail");
        let buffer = EvidenceBuffer::new(config.buffer_size);
        Self { config, buffer, client }
    }

    /// Non-blocking. If the request buffer just reached the batch size,
    /// this also kicks off an immediate out-of-band flush.
    pub fn add_request(self: &Arc<Self>, event: RequestEvent) {
        if !self.config.enabled {
            return;
        }
        self.buffer.add_request(event);
        self.maybe_spawn_flush();
    }

    pub fn add_violation(self: &Arc<Self>, event: ViolationEvent) {
        if !self.config.enabled {
            return;
        }
        self.buffer.add_violation(event);
        self.maybe_spawn_flush();
    }

    fn maybe_spawn_flush(self: &Arc<Self>) {
        if self.buffer.should_flush(self.config.batch_size) {
            let engine = Arc::clone(self);
            tokio::spawn(async move { engine.flush_once().await });
        }
    }

    /// Drain whatever is buffered and POST it to the sidecar. Any
    /// failure is logged and the batch is dropped — telemetry never
    /// retries and never back-pressures the proxy.
    pub async fn flush_once(&self) {
        if !self.config.enabled {
            return;
        }
        let Some(url) = &self.config.sidecar_url else {
            return;
        };

        let (requests, violations) = self.buffer.drain();
        if requests.is_empty() && violations.is_empty() {
            return;
        }

        let batch = FlushBatch { requests: &requests, violations: &violations };
        let mut request = self.client.post(url).json(&batch);
        if let Some(api_key) = &self.config.api_key {
            request = request.header("X-API-Key", api_key);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(requests = requests.len(), violations = violations.len(), "telemetry batch flushed");
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), "telemetry sidecar rejected batch, dropping");
            }
            Err(err) => {
                tracing::warn!(error = %err, "telemetry flush failed, dropping batch");
            }
        }
    }

    /// Background scheduler: flushes every `flush_interval_secs` for as
    /// long as the process runs.
    pub fn spawn_scheduler(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(self.config.flush_interval_secs));
            loop {
                ticker.tick().await;
                self.flush_once().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acvps_core::evidence::RequestStatus;
    use acvps_core::metric::MetricMap;
    use chrono::Utc;

    fn request_event() -> RequestEvent {
        RequestEvent {
            trace_id: "t1".into(),
            contract_id: "hc-v1".into(),
            tenant_id: "acme".into(),
            status: RequestStatus::Allowed,
            metrics: MetricMap::new(),
            latency_ms: 1,
            request_bytes: 10,
            response_bytes: 20,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn disabled_engine_drops_events_without_buffering() {
        let engine = Arc::new(TelemetryEngine::new(TelemetryConfig { enabled: false, ..Default::default() }));
        engine.add_request(request_event());
        assert_eq!(engine.buffer.len(), (0, 0));
    }

    #[tokio::test]
    async fn flush_without_sidecar_url_is_a_noop() {
        let engine = TelemetryEngine::new(TelemetryConfig { sidecar_url: None, ..Default::default() });
        engine.buffer.add_request(request_event());
        engine.flush_once().await;
        assert_eq!(engine.buffer.len(), (1, 0));
    }

    #[tokio::test]
    async fn enabled_engine_buffers_events() {
        let engine = Arc::new(TelemetryEngine::new(TelemetryConfig { batch_size: 100, ..Default::default() }));
        engine.add_request(request_event());
        assert_eq!(engine.buffer.len(), (1, 0));
    }
}
