//! settle-cloud service entry point

use settle_cloud::pos::sync_job;
use settle_cloud::{AppState, Config, api};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "settle_cloud=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!("Starting settle-cloud (env: {})", config.environment);

    let state = AppState::new(&config).await?;
    let shutdown = CancellationToken::new();

    // Periodic rate limiter cleanup (every 5 minutes)
    let rate_limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            rate_limiter.cleanup().await;
        }
    });

    let sync_handle = tokio::spawn(sync_job::run_scheduler(
        state.store.clone(),
        state.pos.clone(),
        config.pos_sync_interval,
        config.pos_sync_concurrency,
        shutdown.clone(),
    ));

    let app = api::create_router(state);
    let http_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("settle-cloud HTTP listening on {http_addr}");

    let server_shutdown = shutdown.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown signal received");
        server_shutdown.cancel();
    })
    .await?;

    shutdown.cancel();
    sync_handle.await?;
    tracing::info!("settle-cloud stopped");
    Ok(())
}
