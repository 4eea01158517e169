//! `pricescout serve`: run the HTTP service until Ctrl+C or SIGTERM.

use crate::config::ServiceConfig;
use crate::dispatcher::Dispatcher;
use crate::rest::{self, AppState};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

pub async fn run(config: ServiceConfig) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        driver_port = config.driver_port,
        profile = %config.browser_profile,
        "starting pricescout"
    );

    let dispatcher = Dispatcher::from_config(&config).context("failed to build dispatcher")?;
    let state = Arc::new(AppState {
        dispatcher,
        service_name: config.service_name.clone(),
    });

    rest::serve(&config.bind_addr(), Arc::clone(&state), shutdown_signal())
        .await
        .with_context(|| format!("HTTP server on {} failed", config.bind_addr()))?;

    let remaining = state.dispatcher.state().tracker.active_count();
    if remaining > 0 {
        warn!(remaining, "stopped with requests still in flight");
    } else {
        info!("pricescout stopped");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("received shutdown signal");
}
