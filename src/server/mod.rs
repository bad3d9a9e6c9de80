//! HTTP 服务：路由、优雅停机、服务注册

pub mod registry;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::error::ServiceError;
use crate::service::DbService;
use registry::ConsulRegistry;

pub type AppState = Arc<DbService>;

pub fn app(service: AppState) -> Router {
    routes::router()
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Serves until Ctrl+C or SIGTERM, then deregisters, rolls back open
/// sessions and closes every connection, in that order.
pub async fn run_server(service: AppState) -> Result<(), ServiceError> {
    let config = service.config().clone();
    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!(host = %config.host, port = config.port, "server listening");

    let registry = config
        .registry
        .enabled
        .then(|| ConsulRegistry::new(&config));
    if let Some(registry) = &registry {
        registry.register().await;
    }

    let served = axum::serve(listener, app(service.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await;
    if let Err(e) = &served {
        error!(error = %e, "server stopped with error");
    }

    if let Some(registry) = &registry {
        registry.deregister().await;
    }
    service.shutdown().await;
    info!("server shutdown complete");
    served.map_err(ServiceError::from)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
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
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, starting shutdown"),
        _ = terminate => info!("received SIGTERM, starting shutdown"),
    }
}
