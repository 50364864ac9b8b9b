//! `virt-api` binary: serve the host's entity tree over HTTP until Ctrl-C.

use clap::Parser;
use resource_framework::tracing::setup_tracing;
use tokio::net::TcpListener;
use tracing::{error, info};
use virt_api::config::Config;
use virt_api::lifecycle::HostSystem;

#[tokio::main]
async fn main() -> Result<(), String> {
    let config = Config::parse();
    setup_tracing(&config.log_filter);

    let system = HostSystem::new(&config);
    let listener = TcpListener::bind(config.listen)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", config.listen))?;
    info!(addr = %config.listen, "Listening");

    let served = axum::serve(listener, system.router())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    system.shutdown().await;
    served.map_err(|e| {
        error!(error = %e, "Server failed");
        e.to_string()
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
