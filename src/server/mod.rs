//! HTTP transport over the job registry.

pub mod auth;
pub mod error;
pub mod routes;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::WorkerConfig;
use crate::registry::JobRegistry;

pub use error::ApiError;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<JobRegistry>,
    pub token: Arc<str>,
}

impl AppState {
    pub fn new(registry: Arc<JobRegistry>, token: impl Into<Arc<str>>) -> Self {
        Self {
            registry,
            token: token.into(),
        }
    }
}

/// Build the authenticated API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/jobs", get(routes::list_jobs))
        .route("/jobs/start", post(routes::start_job))
        .route("/jobs/stop", post(routes::stop_job))
        .route("/jobs/status", get(routes::job_status))
        .route("/jobs/output", get(routes::job_output))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C, then stop every running job and wait for the
/// supervisors to finish.
///
/// Serves HTTPS when the config names a certificate and key, plain HTTP
/// otherwise.
pub async fn serve(config: &WorkerConfig) -> Result<()> {
    if config.auth_token.is_empty() {
        bail!("no auth token configured; set `auth_token` in jobworker.toml or JOBWORKER_TOKEN");
    }
    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("invalid listen address `{}`", config.listen_addr))?;
    let tls = match config.tls_identity()? {
        Some((cert, key)) => Some(load_tls(cert, key).await?),
        None => None,
    };

    let registry = Arc::new(JobRegistry::with_drain_timeout(config.output_drain_timeout()));
    let app = router(AppState::new(Arc::clone(&registry), config.auth_token.as_str()));

    match tls {
        Some(tls) => {
            let handle = Handle::new();
            tokio::spawn({
                let handle = handle.clone();
                async move {
                    shutdown_signal().await;
                    handle.graceful_shutdown(None);
                }
            });
            info!(%addr, "job server listening (https)");
            axum_server::bind_rustls(addr, tls)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .context("server error")?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            info!(%addr, "job server listening (http)");
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("server error")?;
        }
    }

    info!(jobs = registry.len(), "shutting down, stopping running jobs");
    registry.shutdown().await;
    Ok(())
}

async fn load_tls(cert: &Path, key: &Path) -> Result<RustlsConfig> {
    // Err means a provider is already installed, which is fine.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    RustlsConfig::from_pem_file(cert, key).await.with_context(|| {
        format!(
            "failed to load TLS certificate {} / key {}",
            cert.display(),
            key.display()
        )
    })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_token() -> WorkerConfig {
        WorkerConfig {
            listen_addr: "127.0.0.1:0".into(),
            auth_token: "serve-test-token".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn serve_requires_a_token() {
        let err = serve(&WorkerConfig::default()).await.unwrap_err();
        assert!(err.to_string().contains("no auth token"));
    }

    #[tokio::test]
    async fn serve_rejects_half_configured_tls() {
        let config = WorkerConfig {
            tls_key: Some("server.key".into()),
            ..config_with_token()
        };
        let err = serve(&config).await.unwrap_err();
        assert!(err.to_string().contains("must be set together"));
    }

    #[tokio::test]
    async fn serve_reports_unreadable_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let config = WorkerConfig {
            tls_cert: Some(dir.path().join("missing.crt")),
            tls_key: Some(dir.path().join("missing.key")),
            ..config_with_token()
        };
        let err = serve(&config).await.unwrap_err();
        assert!(err.to_string().contains("failed to load TLS certificate"));
    }
}
