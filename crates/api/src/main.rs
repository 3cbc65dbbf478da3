use anyhow::Context;
use tokio::signal;

use dynprice_infra::PricingConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dynprice_observability::init();

    let config = PricingConfig::from_env().context("invalid configuration")?;
    let services = dynprice_api::app::services::build_services(&config)
        .await
        .context("failed to start pricing services")?;

    let app = dynprice_api::app::build_app(services.prices.clone());

    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.http_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    let grace = config.shutdown_grace();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    tracing::info!("http server stopped; stopping consumers");
    if tokio::time::timeout(grace, services.shutdown()).await.is_err() {
        tracing::warn!(grace_secs = grace.as_secs(), "consumers did not stop within the grace period");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}
