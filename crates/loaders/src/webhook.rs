//! The webhook loader channel: POST bodies carrying an `event` and
//! `tenant_id` trigger the same targeted-or-full load as SSE events.
//! Weakly authenticated by design — an optional shared secret is checked
//! with constant-time HMAC-SHA256, but the endpoint is open when no secret
//! is configured.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::{LoaderError, Result};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub event: String,
    pub tenant_id: Option<String>,
    pub contract_id: Option<String>,
}

/// Verify `signature` (an optional `sha256=` prefix followed by hex) over
/// `body` using `secret`. An unconfigured secret always passes — callers
/// are expected to log a startup warning instead of rejecting requests.
pub fn validate_signature(body: &[u8], signature: Option<&str>, secret: Option<&str>) -> bool {
    let secret = match secret {
        Some(s) if !s.is_empty() => s,
        _ => return true,
    };

    let signature = match signature {
        Some(s) => s,
        None => return false,
    };

    let sig_hex = signature.strip_prefix("sha256=").unwrap_or(signature);
    let provided_bytes = match hex::decode(sig_hex) {
        Ok(b) => b,
        Err(_) => return false,
    };

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    mac.verify_slice(&provided_bytes).is_ok()
}

/// Parse and (if a secret is configured) authenticate a webhook delivery.
pub fn parse_webhook(body: &[u8], signature: Option<&str>, secret: Option<&str>) -> Result<WebhookPayload> {
    if !validate_signature(body, signature, secret) {
        return Err(LoaderError::Webhook("signature validation failed".to_string()));
    }
    Ok(serde_json::from_slice(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_secret_always_passes() {
        assert!(validate_signature(b"anything", None, None));
        assert!(validate_signature(b"anything", Some("bogus"), Some("")));
    }

    #[test]
    fn missing_signature_rejected_when_secret_configured() {
        assert!(!validate_signature(b"body", None, Some("topsecret")));
    }

    #[test]
    fn valid_hmac_accepted() {
        let secret = "topsecret";
        let body = b"{\"event\":\"contract_updated\"}";
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let sig = hex::encode(mac.finalize().into_bytes());
        assert!(validate_signature(body, Some(&format!("sha256={sig}")), Some(secret)));
    }

    #[test]
    fn tampered_body_rejected() {
        let secret = "topsecret";
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(b"original");
        let sig = hex::encode(mac.finalize().into_bytes());
        assert!(!validate_signature(b"tampered", Some(&format!("sha256={sig}")), Some(secret)));
    }

    #[test]
    fn parse_webhook_extracts_fields() {
        let body = br#"{"event":"contract_updated","tenant_id":"acme","contract_id":"hc-v1"}"#;
        let payload = parse_webhook(body, None, None).unwrap();
        assert_eq!(payload.event, "contract_updated");
        assert_eq!(payload.tenant_id.as_deref(), Some("acme"));
    }
}
