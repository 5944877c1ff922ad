//! The gateway's error surface, mapped onto the client-fault / policy-block
//! / backend-fault / gateway-fault taxonomy the proxy pipeline and the
//! management API both answer to.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("missing required header '{0}'")]
    MissingHeader(&'static str),

    #[error("invalid API key")]
    InvalidApiKey,

    #[error("tenant id in X-Tenant-ID does not match the authenticated key")]
    TenantMismatch,

    #[error("certificate not found or expired")]
    CertificateRequired,

    #[error("contract '{0}' not found")]
    ContractNotFound(String),

    #[error("guardrail '{0}' not found")]
    GuardrailNotFound(String),

    #[error("guardrail '{0}' is already registered")]
    GuardrailAlreadyRegistered(String),

    #[error("built-in guardrail '{0}' cannot be deleted")]
    BuiltinGuardrailImmutable(String),

    #[error("backend unreachable: {0}")]
    BackendUnreachable(String),

    #[error("backend response body could not be read: {0}")]
    BackendUnreadable(String),

    #[error("request body is not valid JSON: {0}")]
    InvalidBody(String),

    #[error("webhook rejected: {0}")]
    WebhookRejected(String),

    #[error(transparent)]
    Contract(#[from] acvps_contracts::ContractError),

    #[error(transparent)]
    Guardrail(#[from] acvps_guardrails::GuardrailError),

    #[error(transparent)]
    Validation(#[from] acvps_validation::ValidationError),

    #[error(transparent)]
    Loader(#[from] acvps_loaders::LoaderError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl GatewayError {
    fn code(&self) -> (StatusCode, &'static str) {
        match self {
            GatewayError::MissingHeader(_) => (StatusCode::BAD_REQUEST, "MISSING_HEADER"),
            GatewayError::InvalidBody(_) => (StatusCode::BAD_REQUEST, "INVALID_BODY"),
            GatewayError::InvalidApiKey => (StatusCode::UNAUTHORIZED, "INVALID_API_KEY"),
            GatewayError::CertificateRequired => (StatusCode::UNAUTHORIZED, "CERTIFICATE_REQUIRED"),
            GatewayError::TenantMismatch => (StatusCode::FORBIDDEN, "TENANT_MISMATCH"),
            GatewayError::BuiltinGuardrailImmutable(_) => (StatusCode::FORBIDDEN, "GUARDRAIL_IMMUTABLE"),
            GatewayError::ContractNotFound(_) => (StatusCode::NOT_FOUND, "CONTRACT_NOT_FOUND"),
            GatewayError::GuardrailNotFound(_) => (StatusCode::NOT_FOUND, "GUARDRAIL_NOT_FOUND"),
            GatewayError::GuardrailAlreadyRegistered(_) => (StatusCode::CONFLICT, "GUARDRAIL_ALREADY_REGISTERED"),
            GatewayError::BackendUnreachable(_) => (StatusCode::BAD_GATEWAY, "PROXY_ERROR"),
            GatewayError::BackendUnreadable(_) => (StatusCode::INTERNAL_SERVER_ERROR, "BACKEND_UNREADABLE"),
            GatewayError::WebhookRejected(_) => (StatusCode::BAD_REQUEST, "WEBHOOK_REJECTED"),
            GatewayError::Validation(_) => (StatusCode::INTERNAL_SERVER_ERROR, "VALIDATION_ERROR"),
            GatewayError::Contract(_) | GatewayError::Guardrail(_) | GatewayError::Loader(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "VALIDATION_ERROR")
            }
            GatewayError::Http(_) => (StatusCode::BAD_GATEWAY, "PROXY_ERROR"),
            GatewayError::Json(_) => (StatusCode::BAD_REQUEST, "INVALID_BODY"),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, code) = self.code();
        if status.is_server_error() {
            tracing::error!(error = %self, code, "gateway request failed");
        } else {
            tracing::debug!(error = %self, code, "gateway request rejected");
        }
        (status, Json(ErrorBody { error: code, message: self.to_string() })).into_response()
    }
}
