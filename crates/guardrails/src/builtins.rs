//! The three built-in guardrails every gateway process registers at
//! start-up: PII detection, citation grounding, and hallucination risk.
//!
//! These are plain pattern-counting functions — no LLM call, no network
//! access — so they run on every request with negligible latency.

use acvps_core::metric::{clamp, MetricMap};
use regex_lite::Regex;
use std::sync::OnceLock;

use crate::template::extract_text;

pub const PII_GUARDRAIL_ID: &str = "builtin.pii_detector";
pub const GROUNDING_GUARDRAIL_ID: &str = "builtin.grounding_analyzer";
pub const HALLUCINATION_GUARDRAIL_ID: &str = "builtin.hallucination_detector";

struct PiiPatterns {
    ssn: Regex,
    email: Regex,
    phone: Regex,
    credit_card: Regex,
    zip: Regex,
}

fn pii_patterns() -> &'static PiiPatterns {
    static PATTERNS: OnceLock<PiiPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| PiiPatterns {
        ssn: Regex::new(r"^\d{3}-\d{2}-\d{4}$|\b\d{3}-\d{2}-\d{4}\b").unwrap(),
        email: Regex::new(r"\b[\w.+-]+@[\w-]+\.[\w.-]+\b").unwrap(),
        phone: Regex::new(r"\b(\+?1[-. ]?)?\(?\d{3}\)?[-. ]\d{3}[-. ]\d{4}\b").unwrap(),
        credit_card: Regex::new(r"\b\d{4}[- ]?\d{4}[- ]?\d{4}[- ]?\d{4}\b").unwrap(),
        zip: Regex::new(r"\b\d{5}(-\d{4})?\b").unwrap(),
    })
}

/// `pii_risk = clamp(total_matches / 5, 0, 1)`.
pub fn pii_detector(payload: &serde_json::Value) -> MetricMap {
    let text = extract_text(payload);
    let patterns = pii_patterns();
    let total_matches = patterns.ssn.find_iter(&text).count()
        + patterns.email.find_iter(&text).count()
        + patterns.phone.find_iter(&text).count()
        + patterns.credit_card.find_iter(&text).count()
        + patterns.zip.find_iter(&text).count();

    let mut metrics = MetricMap::new();
    metrics.insert("pii_risk".into(), clamp(total_matches as f64 / 5.0, 0.0, 1.0));
    metrics
}

struct GroundingPatterns {
    numbered_citation: Regex,
    parenthetical_citation: Regex,
    url: Regex,
    source_keyword: Regex,
    sentence_boundary: Regex,
}

fn grounding_patterns() -> &'static GroundingPatterns {
    static PATTERNS: OnceLock<GroundingPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| GroundingPatterns {
        numbered_citation: Regex::new(r"\[\d+\]").unwrap(),
        parenthetical_citation: Regex::new(r"\([A-Za-z][\w .,]*\d{4}\)").unwrap(),
        url: Regex::new(r"https?://\S+").unwrap(),
        source_keyword: Regex::new(r"(?i)\bsource\s*:").unwrap(),
        sentence_boundary: Regex::new(r"[.!?]+").unwrap(),
    })
}

/// `grounding_confidence = clamp(citations / sentences, 0, 1)`, sentence
/// count floored at 1.
pub fn grounding_analyzer(payload: &serde_json::Value) -> MetricMap {
    let text = extract_text(payload);
    let patterns = grounding_patterns();

    let citations = patterns.numbered_citation.find_iter(&text).count()
        + patterns.parenthetical_citation.find_iter(&text).count()
        + patterns.url.find_iter(&text).count()
        + patterns.source_keyword.find_iter(&text).count();

    let sentences = patterns.sentence_boundary.find_iter(&text).count().max(1);

    let mut metrics = MetricMap::new();
    metrics.insert(
        "grounding_confidence".into(),
        clamp(citations as f64 / sentences as f64, 0.0, 1.0),
    );
    metrics
}

struct HallucinationPatterns {
    vague: Regex,
    number: Regex,
    date: Regex,
    proper_noun: Regex,
    measurement: Regex,
}

fn hallucination_patterns() -> &'static HallucinationPatterns {
    static PATTERNS: OnceLock<HallucinationPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| HallucinationPatterns {
        vague: Regex::new(r"(?i)\b(many|some|several|various|often|generally|typically|usually|a lot of|numerous)\b").unwrap(),
        number: Regex::new(r"\b\d+(\.\d+)?\b").unwrap(),
        date: Regex::new(r"\b\d{4}-\d{2}-\d{2}\b|\b(19|20)\d{2}\b").unwrap(),
        proper_noun: Regex::new(r"\b[A-Z][a-z]{2,}\b").unwrap(),
        measurement: Regex::new(r"(?i)\b\d+(\.\d+)?\s?(kg|km|mg|ml|cm|mm|gb|mb|%|percent)\b").unwrap(),
    })
}

/// `hallucination_risk = vague / (vague + specific)`, or `0.5` when
/// neither vague nor specific markers are present.
pub fn hallucination_detector(payload: &serde_json::Value) -> MetricMap {
    let text = extract_text(payload);
    let patterns = hallucination_patterns();

    let vague = patterns.vague.find_iter(&text).count();
    let specific = patterns.number.find_iter(&text).count()
        + patterns.date.find_iter(&text).count()
        + patterns.proper_noun.find_iter(&text).count()
        + patterns.measurement.find_iter(&text).count();

    let risk = if vague + specific == 0 {
        0.5
    } else {
        vague as f64 / (vague + specific) as f64
    };

    let mut metrics = MetricMap::new();
    metrics.insert("hallucination_risk".into(), risk);
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pii_detector_flags_email_and_ssn() {
        let payload = serde_json::json!({"text": "contact me at a@b.com, ssn 123-45-6789"});
        let metrics = pii_detector(&payload);
        assert!(metrics["pii_risk"] > 0.0);
    }

    #[test]
    fn pii_detector_is_clean_on_plain_text() {
        let payload = serde_json::json!({"text": "the weather is nice today"});
        let metrics = pii_detector(&payload);
        assert_eq!(metrics["pii_risk"], 0.0);
    }

    #[test]
    fn grounding_analyzer_rewards_citations() {
        let payload = serde_json::json!({"text": "The sky is blue [1]. Source: NOAA 2020."});
        let metrics = grounding_analyzer(&payload);
        assert!(metrics["grounding_confidence"] > 0.0);
    }

    #[test]
    fn grounding_analyzer_penalizes_bare_claims() {
        let payload = serde_json::json!({"text": "The sky is blue. It is a nice day. Birds fly."});
        let metrics = grounding_analyzer(&payload);
        assert_eq!(metrics["grounding_confidence"], 0.0);
    }

    #[test]
    fn hallucination_detector_neutral_on_empty_signal() {
        let payload = serde_json::json!({"text": ""});
        let metrics = hallucination_detector(&payload);
        assert_eq!(metrics["hallucination_risk"], 0.5);
    }

    #[test]
    fn hallucination_detector_favors_specificity() {
        let payload = serde_json::json!({"text": "In 2020, Boston recorded 42.3 mm of rainfall."});
        let metrics = hallucination_detector(&payload);
        assert!(metrics["hallucination_risk"] < 0.5);
    }
}
