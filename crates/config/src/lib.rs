//! Configuration loading and validation for the ACVPS gateway.
//!
//! Unlike a control-plane-managed system, the gateway's configuration
//! surface is environment-first: every setting in this module is read
//! directly from the process environment with a sensible default, the
//! same "defaulted struct with environment overrides" shape this
//! workspace's other config loader uses for its TOML file.

use std::env;
use std::fmt;

/// The root configuration structure for the gateway process.
#[derive(Clone)]
pub struct AppConfig {
    pub mode: GatewayMode,
    pub api_key: Option<String>,
    pub tenant_id: String,
    pub control_plane_url: Option<String>,
    pub backend_url: Option<String>,
    pub redis: RedisConfig,
    pub metrics: MetricsConfig,
    pub llm: LlmConfig,
    pub guardrail_repo_path: Option<String>,
    pub log_level: String,
    pub log_format: LogFormat,
    pub gateway_bind_addr: String,
    pub metrics_bind_addr: String,
    pub proxy_timeout_secs: u64,
    pub control_plane_timeout_secs: u64,
    pub sidecar_timeout_secs: u64,
    pub llm_guardrail_timeout_secs: u64,
    pub cold_load_on_boot: bool,
    pub pull_interval_secs: u64,
    pub sse_enabled: bool,
    pub guardrail_repo_ttl_secs: u64,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
    Local,
    Cloud,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Plain,
    Json,
}

#[derive(Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub disabled: bool,
}

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub service_url: Option<String>,
    pub batch_size: usize,
    pub batch_interval_secs: u64,
    pub buffer_size: usize,
}

#[derive(Clone)]
pub struct LlmConfig {
    pub openai_api_key: Option<String>,
    pub groq_api_key: Option<String>,
}

impl LlmConfig {
    /// The configured key, preferring OpenAI over Groq, if either is set.
    pub fn active_api_key(&self) -> Option<&str> {
        self.openai_api_key
            .as_deref()
            .or(self.groq_api_key.as_deref())
    }

    pub fn is_configured(&self) -> bool {
        self.active_api_key().is_some()
    }
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("mode", &self.mode)
            .field("api_key", &redact(&self.api_key))
            .field("tenant_id", &self.tenant_id)
            .field("control_plane_url", &self.control_plane_url)
            .field("backend_url", &self.backend_url)
            .field("redis", &self.redis)
            .field("metrics", &self.metrics)
            .field("llm", &self.llm)
            .field("guardrail_repo_path", &self.guardrail_repo_path)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("gateway_bind_addr", &self.gateway_bind_addr)
            .field("metrics_bind_addr", &self.metrics_bind_addr)
            .field("webhook_secret", &redact(&self.webhook_secret))
            .finish()
    }
}

impl fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &redact(&self.password))
            .field("disabled", &self.disabled)
            .finish()
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("groq_api_key", &redact(&self.groq_api_key))
            .finish()
    }
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_num<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl AppConfig {
    /// Load configuration from the process environment. Never fails on
    /// missing variables — every field has a documented default.
    pub fn load() -> Result<Self, ConfigError> {
        let mode = match env_string("GATEWAY_MODE", "local").as_str() {
            "cloud" => GatewayMode::Cloud,
            _ => GatewayMode::Local,
        };

        let log_format = match env_string("LOG_FORMAT", "plain").as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Plain,
        };

        let config = Self {
            mode,
            api_key: env_opt_string("GATEWAY_API_KEY"),
            tenant_id: env_string("GATEWAY_TENANT_ID", "default"),
            control_plane_url: env_opt_string("CONTROL_PLANE_URL"),
            backend_url: env_opt_string("BACKEND_URL"),
            redis: RedisConfig {
                host: env_string("REDIS_HOST", "127.0.0.1"),
                port: env_num("REDIS_PORT", 6379),
                password: env_opt_string("REDIS_PASSWORD"),
                disabled: env_bool("REDIS_DISABLED", false),
            },
            metrics: MetricsConfig {
                enabled: env_bool("METRICS_ENABLED", true),
                service_url: env_opt_string("METRICS_SERVICE_URL"),
                batch_size: env_num("METRICS_BATCH_SIZE", 100),
                batch_interval_secs: env_num("METRICS_BATCH_INTERVAL", 5),
                buffer_size: env_num("METRICS_BUFFER_SIZE", 1000),
            },
            llm: LlmConfig {
                openai_api_key: env_opt_string("OPENAI_API_KEY"),
                groq_api_key: env_opt_string("GROQ_API_KEY"),
            },
            guardrail_repo_path: env_opt_string("GUARDRAIL_REPO_PATH"),
            log_level: env_string("LOG_LEVEL", "info"),
            log_format,
            gateway_bind_addr: env_string("GATEWAY_BIND_ADDR", "0.0.0.0:8080"),
            metrics_bind_addr: env_string("METRICS_BIND_ADDR", "0.0.0.0:9090"),
            proxy_timeout_secs: env_num("PROXY_TIMEOUT_SECS", 30),
            control_plane_timeout_secs: env_num("CONTROL_PLANE_TIMEOUT_SECS", 10),
            sidecar_timeout_secs: env_num("SIDECAR_TIMEOUT_SECS", 5),
            llm_guardrail_timeout_secs: env_num("LLM_GUARDRAIL_TIMEOUT_SECS", 15),
            cold_load_on_boot: env_bool("COLD_LOAD_ON_BOOT", true),
            pull_interval_secs: env_num("PULL_INTERVAL_SECS", 60),
            sse_enabled: env_bool("SSE_ENABLED", true),
            guardrail_repo_ttl_secs: env_num("GUARDRAIL_REPO_TTL_SECS", 3600),
            webhook_secret: env_opt_string("GATEWAY_WEBHOOK_SECRET"),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tenant_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "GATEWAY_TENANT_ID must not be empty".into(),
            ));
        }
        if self.webhook_secret.is_none() {
            tracing::warn!(
                "GATEWAY_WEBHOOK_SECRET is not set — the webhook endpoint will accept \
                 unsigned requests; restrict it to a private network"
            );
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: GatewayMode::Local,
            api_key: None,
            tenant_id: "default".into(),
            control_plane_url: None,
            backend_url: None,
            redis: RedisConfig {
                host: "127.0.0.1".into(),
                port: 6379,
                password: None,
                disabled: true,
            },
            metrics: MetricsConfig {
                enabled: true,
                service_url: None,
                batch_size: 100,
                batch_interval_secs: 5,
                buffer_size: 1000,
            },
            llm: LlmConfig {
                openai_api_key: None,
                groq_api_key: None,
            },
            guardrail_repo_path: None,
            log_level: "info".into(),
            log_format: LogFormat::Plain,
            gateway_bind_addr: "0.0.0.0:8080".into(),
            metrics_bind_addr: "0.0.0.0:9090".into(),
            proxy_timeout_secs: 30,
            control_plane_timeout_secs: 10,
            sidecar_timeout_secs: 5,
            llm_guardrail_timeout_secs: 15,
            cold_load_on_boot: true,
            pull_interval_secs: 60,
            sse_enabled: true,
            guardrail_repo_ttl_secs: 3600,
            webhook_secret: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.tenant_id, "default");
        assert!(config.redis.disabled);
        assert_eq!(config.gateway_bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk-secret".into());
        config.webhook_secret = Some("hmac-secret".into());
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(!dbg.contains("hmac-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn llm_config_prefers_openai() {
        let llm = LlmConfig {
            openai_api_key: Some("oa".into()),
            groq_api_key: Some("gq".into()),
        };
        assert_eq!(llm.active_api_key(), Some("oa"));
    }

    #[test]
    fn llm_config_falls_back_to_groq() {
        let llm = LlmConfig {
            openai_api_key: None,
            groq_api_key: Some("gq".into()),
        };
        assert_eq!(llm.active_api_key(), Some("gq"));
        assert!(llm.is_configured());
    }

    #[test]
    fn empty_tenant_id_rejected() {
        let config = AppConfig {
            tenant_id: "   ".into(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
