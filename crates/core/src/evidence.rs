//! Evidence events — the append-only record the telemetry emitter buffers
//! and batches to the sidecar.

use crate::metric::{MetricMap, Violation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A request-level identifier threading through logs, observability
/// headers, and emitted evidence events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraceId(pub String);

impl TraceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Allowed,
    Blocked,
}

/// One request-lifecycle evidence event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEvent {
    pub trace_id: String,
    pub contract_id: String,
    pub tenant_id: String,
    pub status: RequestStatus,
    pub metrics: MetricMap,
    pub latency_ms: u64,
    pub request_bytes: usize,
    pub response_bytes: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// One policy-violation evidence event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationEvent {
    pub trace_id: String,
    pub contract_id: String,
    pub tenant_id: String,
    pub metric: String,
    pub value: f64,
    pub threshold: Violation,
    pub severity: ViolationSeverity,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

/// An evidence event as produced by the proxy hot path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvidenceEvent {
    Request(RequestEvent),
    Violation(ViolationEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_id_is_unique() {
        assert_ne!(TraceId::new(), TraceId::new());
    }

    #[test]
    fn evidence_event_serializes_tagged() {
        let event = EvidenceEvent::Request(RequestEvent {
            trace_id: "t1".into(),
            contract_id: "c1".into(),
            tenant_id: "acme".into(),
            status: RequestStatus::Allowed,
            metrics: MetricMap::new(),
            latency_ms: 4,
            request_bytes: 10,
            response_bytes: 20,
            timestamp: Utc::now(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "request");
        assert_eq!(json["status"], "allowed");
    }
}
