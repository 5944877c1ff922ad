//! Stream guardrails (§4.1a): a format-agnostic, byte-level calling
//! convention for guardrails that must run against a raw streaming
//! chunk instead of a parsed JSON payload.

use acvps_core::metric::{clamp, MetricMap};

use crate::config::DynamicGuardrailConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamDirection {
    Request,
    Response,
}

#[derive(Debug, Clone)]
pub struct StreamContext {
    pub direction: StreamDirection,
    pub content_type: String,
}

fn clustering_factor(mean_inter_match_distance: f64) -> f64 {
    if mean_inter_match_distance > 500.0 {
        1.0
    } else if mean_inter_match_distance >= 100.0 {
        1.5
    } else {
        2.0
    }
}

fn confidence_for(byte_len: usize, match_count: usize) -> f64 {
    if (1..=2).contains(&match_count) && byte_len > 1000 {
        return 0.6;
    }
    if byte_len > 50_000 {
        0.5
    } else if byte_len > 10_000 {
        0.7
    } else {
        0.9
    }
}

/// Find byte offsets of every keyword occurrence (case-insensitive,
/// ASCII-lowercased comparison — streams are treated as opaque bytes).
fn match_offsets(bytes: &[u8], keyword: &str) -> Vec<usize> {
    let haystack = bytes.to_ascii_lowercase();
    let needle = keyword.to_ascii_lowercase().into_bytes();
    if needle.is_empty() {
        return Vec::new();
    }
    let mut offsets = Vec::new();
    let mut start = 0;
    while start + needle.len() <= haystack.len() {
        if &haystack[start..start + needle.len()] == needle.as_slice() {
            offsets.push(start);
            start += needle.len();
        } else {
            start += 1;
        }
    }
    offsets
}

/// Run the probabilistic byte-stream scan described in §4.1a and return
/// the produced metric alongside a confidence score in `[0, 1]`.
pub fn evaluate_stream(
    bytes: &[u8],
    _context: &StreamContext,
    config: &DynamicGuardrailConfig,
) -> (MetricMap, f64) {
    let mut offsets: Vec<usize> = config
        .keywords
        .iter()
        .flat_map(|kw| match_offsets(bytes, kw))
        .collect();
    offsets.sort_unstable();

    let match_count = offsets.len();
    let byte_len = bytes.len().max(1);
    let density = match_count as f64 / (byte_len as f64 / 1000.0);

    let mean_distance = if offsets.len() >= 2 {
        let span = offsets.windows(2).map(|w| (w[1] - w[0]) as f64).sum::<f64>();
        span / (offsets.len() - 1) as f64
    } else {
        f64::MAX
    };

    let factor = clustering_factor(mean_distance);
    let risk = clamp(density * factor * 0.1, 0.0, 1.0);
    let score = if config.invert_score { 1.0 - risk } else { risk };

    let mut metrics = MetricMap::new();
    metrics.insert(config.metric_name.clone(), score);

    (metrics, confidence_for(bytes.len(), match_count))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> StreamContext {
        StreamContext { direction: StreamDirection::Response, content_type: "text/plain".into() }
    }

    #[test]
    fn no_matches_yields_zero_risk() {
        let config = DynamicGuardrailConfig::new("s", "desc", "stream_risk").with_keywords(["secret"]);
        let (metrics, confidence) = evaluate_stream(b"hello world", &ctx(), &config);
        assert_eq!(metrics["stream_risk"], 0.0);
        assert_eq!(confidence, 0.9);
    }

    #[test]
    fn long_stream_lowers_confidence() {
        let config = DynamicGuardrailConfig::new("s", "desc", "stream_risk").with_keywords(["x"]);
        let bytes = vec![b'a'; 60_000];
        let (_, confidence) = evaluate_stream(&bytes, &ctx(), &config);
        assert_eq!(confidence, 0.5);
    }

    #[test]
    fn clustered_matches_increase_risk() {
        let config = DynamicGuardrailConfig::new("s", "desc", "stream_risk").with_keywords(["ssn"]);
        let clustered = "ssn ssn ssn ssn ssn".as_bytes();
        let (metrics, _) = evaluate_stream(clustered, &ctx(), &config);
        assert!(metrics["stream_risk"] > 0.0);
    }
}
