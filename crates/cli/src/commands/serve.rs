//! `acvps serve` — start the gateway.

use acvps_config::AppConfig;

pub async fn run(bind: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load()?;
    if let Some(bind) = bind {
        config.gateway_bind_addr = bind;
    }

    tracing::info!(
        mode = ?config.mode,
        bind = %config.gateway_bind_addr,
        metrics_bind = %config.metrics_bind_addr,
        "starting acvps gateway"
    );

    acvps_gateway::start(config).await
}
