use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;

use shepherd_api::app::{self, services::AppServices};
use shepherd_api::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shepherd_observability::init();

    let config = Config::from_env().context("invalid configuration")?;
    if config.uses_dev_secret() {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
    }

    let services = Arc::new(AppServices::in_memory(&config));
    services
        .bootstrap_admin(&config, Utc::now())
        .context("failed to provision bootstrap admin")?;

    let purge = services.clone();
    let period = config
        .rate_limit
        .window
        .to_std()
        .unwrap_or(std::time::Duration::from_secs(900))
        .max(std::time::Duration::from_secs(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            purge.purge_rate_limits(Utc::now());
        }
    });

    let app = app::build_app_with(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("server error")?;
    Ok(())
}
