//! The `/metrics` Prometheus text-format endpoint, served on its own
//! bind address so it can sit behind a different network policy than the
//! proxy surface.

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::state::SharedGatewayState;

pub fn metrics_router(state: SharedGatewayState) -> Router {
    Router::new().route("/metrics", get(metrics_handler)).with_state(state)
}

async fn metrics_handler(State(state): State<SharedGatewayState>) -> impl IntoResponse {
    let mut out = String::new();

    push_counter(&mut out, "acvps_contract_store_hits_total", "Contract store cache hits", state.store.hit_count());
    push_counter(&mut out, "acvps_contract_store_misses_total", "Contract store cache misses", state.store.miss_count());
    push_gauge(&mut out, "acvps_contract_store_entries", "Raw contract entries currently cached", state.store.len() as f64);
    push_gauge(&mut out, "acvps_runtime_bindings", "Enforceable contracts currently bound", state.bindings.len() as f64);
    push_gauge(&mut out, "acvps_guardrails_registered", "Guardrails registered across all sources", state.registry.list().len() as f64);
    push_gauge(&mut out, "acvps_uptime_seconds", "Seconds since process start", state.started_at.elapsed().as_secs_f64());

    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], out)
}

fn push_counter(out: &mut String, name: &str, help: &str, value: u64) {
    out.push_str(&format!("# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}\n"));
}

fn push_gauge(out: &mut String, name: &str, help: &str, value: f64) {
    out.push_str(&format!("# HELP {name} {help}\n# TYPE {name} gauge\n{name} {value}\n"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_line_has_help_and_type() {
        let mut out = String::new();
        push_counter(&mut out, "acvps_test_total", "a test counter", 3);
        assert!(out.contains("# TYPE acvps_test_total counter"));
        assert!(out.contains("acvps_test_total 3"));
    }
}
