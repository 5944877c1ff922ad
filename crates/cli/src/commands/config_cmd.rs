//! `acvps config` — configuration management commands.

use acvps_config::{AppConfig, GatewayMode};

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("  config parsed successfully");

            let mut warnings = Vec::new();

            if config.mode == GatewayMode::Cloud && config.control_plane_url.is_none() {
                warnings.push("mode=cloud but CONTROL_PLANE_URL is not set".to_string());
            }
            if !config.llm.is_configured() {
                warnings.push("no LLM key set (OPENAI_API_KEY or GROQ_API_KEY) — dynamic guardrails will fall back to keyword-only scoring".to_string());
            }
            if config.webhook_secret.is_none() {
                warnings.push("GATEWAY_WEBHOOK_SECRET is not set — webhook endpoint accepts unsigned requests".to_string());
            }
            if config.redis.disabled {
                warnings.push("REDIS_DISABLED=true — contract cache and pub/sub are in-process only".to_string());
            }

            if warnings.is_empty() {
                println!("  all checks passed");
            } else {
                for warning in &warnings {
                    println!("  warning: {warning}");
                }
            }
            Ok(())
        }
        Err(err) => {
            println!("  configuration is invalid: {err}");
            Err(Box::new(err))
        }
    }
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    println!("mode:                    {:?}", config.mode);
    println!("tenant_id:               {}", config.tenant_id);
    println!("gateway_bind_addr:       {}", config.gateway_bind_addr);
    println!("metrics_bind_addr:       {}", config.metrics_bind_addr);
    println!("control_plane_url:      {}", config.control_plane_url.as_deref().unwrap_or("(none)"));
    println!("backend_url:             {}", config.backend_url.as_deref().unwrap_or("(none)"));
    println!("redis_disabled:          {}", config.redis.disabled);
    println!("cold_load_on_boot:       {}", config.cold_load_on_boot);
    println!("sse_enabled:             {}", config.sse_enabled);
    println!("pull_interval_secs:      {}", config.pull_interval_secs);
    println!("llm_configured:          {}", config.llm.is_configured());
    Ok(())
}
