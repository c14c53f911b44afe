//! HTTP classification service: `GET /health`, `POST /classify`.

mod error;
pub use error::{ApiError, ServeError};

pub mod client;
pub mod routes;

pub use client::{ClassifierClient, ClientError};
pub use routes::{AppState, ClassifyRequest, HealthResponse, router};

use std::net::SocketAddr;

use clausify_ai::Classify;
use tracing::info;

/// Default bind address of the service.
pub const DEFAULT_ADDR: &str = "127.0.0.1:8001";

/// Serve `classifier` on `addr` until Ctrl-C.
pub async fn serve(addr: SocketAddr, classifier: Box<dyn Classify + Send>) -> Result<(), ServeError> {
    let labels = classifier.labels();
    let app = router(AppState::new(classifier));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;
    info!(%addr, labels = labels.len(), "classifier service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("classifier service stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received (Ctrl-C)"),
        Err(e) => {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}
