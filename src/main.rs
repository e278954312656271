use admission_counter::{
    api::create_router,
    config::Config,
    limiter::{AdmissionCounter, AdmissionSettings},
    observability::init_tracing,
    store::create_store,
};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;
    config.validate()?;

    // Initialize tracing/logging
    init_tracing(&config.observability, config.store.backend.as_str())?;

    tracing::info!("Starting admission counter service");
    tracing::info!(
        environment = %config.environment,
        enforce = config.enforce(),
        "Configuration loaded: {:?}",
        config.limiter
    );

    // Create the shared counter store
    let store = create_store(&config.store).await?;
    tracing::info!(backend = store.backend_name(), "Counter store ready");

    let counter = Arc::new(AdmissionCounter::new(
        store,
        AdmissionSettings::from_config(&config),
    ));

    // Create router
    let app = create_router(
        counter,
        config.limiter.store_failure_policy,
        config.observability.metrics_enabled,
    );

    // Bind server
    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid server host {}: {}", config.server.host, e))?;
    let addr = SocketAddr::new(host, config.server.port);
    tracing::info!("Listening on http://{}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Admission counter service is ready to accept requests");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    tracing::info!("Admission counter service stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
