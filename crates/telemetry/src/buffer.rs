//! Bounded, non-blocking event buffer. Two arrays — requests and
//! violations — each capped at a configured size; pushing past the cap
//! drops the oldest entry rather than growing or blocking the producer.

use std::sync::Mutex;

use acvps_core::evidence::{RequestEvent, ViolationEvent};

pub struct EvidenceBuffer {
    capacity: usize,
    requests: Mutex<Vec<RequestEvent>>,
    violations: Mutex<Vec<ViolationEvent>>,
}

impl EvidenceBuffer {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, requests: Mutex::new(Vec::new()), violations: Mutex::new(Vec::new()) }
    }

    /// Non-blocking: the proxy hot path must never stall on telemetry.
    pub fn add_request(&self, event: RequestEvent) {
        let mut requests = self.requests.lock().expect("request buffer lock poisoned");
        push_bounded(&mut requests, event, self.capacity);
    }

    pub fn add_violation(&self, event: ViolationEvent) {
        let mut violations = self.violations.lock().expect("violation buffer lock poisoned");
        push_bounded(&mut violations, event, self.capacity);
    }

    pub fn len(&self) -> (usize, usize) {
        (
            self.requests.lock().expect("request buffer lock poisoned").len(),
            self.violations.lock().expect("violation buffer lock poisoned").len(),
        )
    }

    /// True once either buffer has reached `batch_size`.
    pub fn should_flush(&self, batch_size: usize) -> bool {
        let (requests, violations) = self.len();
        requests >= batch_size || violations >= batch_size
    }

    /// Remove and return everything currently buffered.
    pub fn drain(&self) -> (Vec<RequestEvent>, Vec<ViolationEvent>) {
        let requests = std::mem::take(&mut *self.requests.lock().expect("request buffer lock poisoned"));
        let violations = std::mem::take(&mut *self.violations.lock().expect("violation buffer lock poisoned"));
        (requests, violations)
    }
}

fn push_bounded<T>(buf: &mut Vec<T>, item: T, capacity: usize) {
    if buf.len() >= capacity {
        buf.remove(0);
    }
    buf.push(item);
}

#[cfg(test)]
mod tests {
    use super::*;
    use acvps_core::evidence::RequestStatus;
    use acvps_core::metric::MetricMap;
    use chrono::Utc;

    fn request_event(trace_id: &str) -> RequestEvent {
        RequestEvent {
            trace_id: trace_id.to_string(),
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

    #[test]
    fn add_and_drain_round_trips() {
        let buffer = EvidenceBuffer::new(10);
        buffer.add_request(request_event("t1"));
        let (requests, violations) = buffer.drain();
        assert_eq!(requests.len(), 1);
        assert!(violations.is_empty());
        assert_eq!(buffer.len(), (0, 0));
    }

    #[test]
    fn overflow_drops_oldest() {
        let buffer = EvidenceBuffer::new(3);
        for i in 0..5 {
            buffer.add_request(request_event(&format!("t{i}")));
        }
        let (requests, _) = buffer.drain();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].trace_id, "t2");
        assert_eq!(requests[2].trace_id, "t4");
    }

    #[test]
    fn should_flush_when_batch_size_reached() {
        let buffer = EvidenceBuffer::new(100);
        assert!(!buffer.should_flush(2));
        buffer.add_request(request_event("t1"));
        buffer.add_request(request_event("t2"));
        assert!(buffer.should_flush(2));
    }
}
