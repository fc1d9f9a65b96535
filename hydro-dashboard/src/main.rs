use anyhow::Result;
use hydro_dashboard::{
    config::AppConfig,
    dashboard, metrics_server, observability,
};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    let credentials = cfg.credentials()?;

    // Start metrics server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    dashboard::serve(cfg, credentials).await
}
