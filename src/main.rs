//! Document Extractor - HTTP front for a cloud document analysis service.

mod analysis;
mod api;
mod config;
mod diagnostics;
mod error;
mod models;
mod service;

use analysis::form_recognizer::FormRecognizerClient;
use analysis::poller::Waiter;
use api::AppState;
use config::Settings;
use service::DocumentService;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "document_extractor=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;
    info!(
        "Using analysis endpoint {} (api-version {})",
        settings.form_recognizer.endpoint, settings.operations.api_version
    );

    let client = FormRecognizerClient::new(&settings)?;

    // Flipped on ctrl-c so pending waits give up instead of blocking shutdown.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let waiter = Waiter::new(
        settings.operations.timeout(),
        settings.operations.poll_interval(),
        shutdown_rx,
    );

    let service = DocumentService::new(
        Arc::new(client),
        waiter,
        settings.operations.template_prebuild,
    );
    let state = AppState {
        service: Arc::new(service),
    };
    let app = api::router(state, settings.server.body_limit_mb * 1024 * 1024);

    let listener = tokio::net::TcpListener::bind(&settings.server.bind).await?;
    info!("Server listening on http://{}", settings.server.bind);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(shutdown: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested, cancelling pending operations");
    let _ = shutdown.send(true);
}
