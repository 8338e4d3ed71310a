use axum::{extract::DefaultBodyLimit, Extension, Router};
use b2_pipeline::B2UploadPipeline;
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::routes;
use crate::types::Environment;

/// Builds the application router with all layers applied
///
/// The pipeline is shared with handlers through an `Extension`, each request
/// working on its own clone.
pub fn build_router(environment: &Environment, pipeline: B2UploadPipeline) -> Router {
    let router = routes::handler()
        .layer(Extension(pipeline))
        .layer(DefaultBodyLimit::max(environment.max_upload_bytes()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(environment.request_timeout())),
        );

    if environment.cors_enabled() {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Starts the server with the given environment and pipeline
///
/// # Errors
///
/// Returns an error if the server fails to start or bind to the port
pub async fn start(environment: &Environment, pipeline: B2UploadPipeline) -> anyhow::Result<()> {
    let router = build_router(environment, pipeline);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], environment.port()?));

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("B2 upload backend started on http://{addr}");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(anyhow::Error::from)
}

/// Resolves once Ctrl+C or SIGTERM is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
