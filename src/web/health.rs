use anyhow::Result;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use super::ReadinessProbe;
use crate::metrics::RoleMetrics;
use crate::pipeline::Shutdown;

/// Serves `/metrics`, `/healthz` and `/readyz`.
pub struct HealthServer<P> {
    metrics: RoleMetrics,
    probe: Arc<P>,
}

impl<P: ReadinessProbe> HealthServer<P> {
    pub fn new(metrics: RoleMetrics, probe: P) -> Self {
        Self {
            metrics,
            probe: Arc::new(probe),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(render_metrics::<P>))
            .route("/healthz", get(healthz))
            .route("/readyz", get(readyz::<P>))
            .with_state(self.clone())
    }

    pub async fn start(self, port: u16, shutdown: Shutdown) -> Result<()> {
        let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
        self.serve(listener, shutdown).await
    }

    /// Serves on an already bound listener until shutdown fires.
    pub async fn serve(self, listener: TcpListener, mut shutdown: Shutdown) -> Result<()> {
        info!("Health server listening on http://{}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        info!("Health server stopped");
        Ok(())
    }
}

impl<P> Clone for HealthServer<P> {
    fn clone(&self) -> Self {
        Self {
            metrics: self.metrics.clone(),
            probe: self.probe.clone(),
        }
    }
}

async fn render_metrics<P: ReadinessProbe>(
    State(server): State<HealthServer<P>>,
) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        server.metrics.render(),
    )
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

async fn readyz<P: ReadinessProbe>(State(server): State<HealthServer<P>>) -> impl IntoResponse {
    if server.probe.is_ready().await {
        (StatusCode::OK, Json(json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable" })),
        )
    }
}
