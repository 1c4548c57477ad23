//! Prometheus metrics and HTTP probes.
//!
//! Serves `/healthz`, `/readyz` and `/metrics` on the configured address.
//! Each `Metrics` owns its registry so tests can build as many as they like.

use crate::error::ControllerError;
use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Controller metrics.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub reconciliations: IntCounter,
    pub reconcile_errors: IntCounterVec,
    pub reconcile_duration: Histogram,
    pub pools_created: IntCounter,
    pub claims_created: IntCounter,
    pub finalizers_removed: IntCounter,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new_custom(Some("vmcluster_ipam".to_string()), None)?;

        let reconciliations = IntCounter::new("reconciliations_total", "VmCluster reconciliations started")?;
        let reconcile_errors = IntCounterVec::new(
            Opts::new("reconcile_errors_total", "VmCluster reconciliations that failed"),
            &["kind"],
        )?;
        let reconcile_duration = Histogram::with_opts(HistogramOpts::new(
            "reconcile_duration_seconds",
            "Time spent in a single VmCluster reconciliation",
        ))?;
        let pools_created = IntCounter::new("pools_created_total", "Address pools created")?;
        let claims_created = IntCounter::new("claims_created_total", "Endpoint address claims created")?;
        let finalizers_removed = IntCounter::new("finalizers_removed_total", "VmCluster finalizers released")?;

        registry.register(Box::new(reconciliations.clone()))?;
        registry.register(Box::new(reconcile_errors.clone()))?;
        registry.register(Box::new(reconcile_duration.clone()))?;
        registry.register(Box::new(pools_created.clone()))?;
        registry.register(Box::new(claims_created.clone()))?;
        registry.register(Box::new(finalizers_removed.clone()))?;

        Ok(Self {
            registry,
            reconciliations,
            reconcile_errors,
            reconcile_duration,
            pools_created,
            claims_created,
            finalizers_removed,
        })
    }

    /// Count a failed reconciliation under `kind` (`permanent` or `transient`)
    pub fn record_error(&self, permanent: bool) {
        let kind = if permanent { "permanent" } else { "transient" };
        self.reconcile_errors.with_label_values(&[kind]).inc();
    }

    /// Render the registry in the Prometheus text format
    pub fn render(&self) -> Result<String, ControllerError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| ControllerError::Metrics(e.to_string()))
    }
}

#[derive(Clone)]
struct ProbeState {
    metrics: Metrics,
    ready: Arc<AtomicBool>,
}

/// Build the probe and metrics router.
pub fn router(metrics: Metrics, ready: Arc<AtomicBool>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .with_state(ProbeState { metrics, ready })
        .layer(TraceLayer::new_for_http())
}

/// Serve probes and metrics until the listener fails.
pub async fn serve(addr: SocketAddr, metrics: Metrics, ready: Arc<AtomicBool>) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ControllerError::Metrics(format!("failed to bind {}: {}", addr, e)))?;
    info!("Serving probes and metrics on {}", addr);
    axum::serve(listener, router(metrics, ready))
        .await
        .map_err(|e| ControllerError::Metrics(e.to_string()))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(state): State<ProbeState>) -> impl IntoResponse {
    if state.ready.load(Ordering::Relaxed) {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "starting")
    }
}

async fn metrics_handler(State(state): State<ProbeState>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    #[test]
    fn test_render_includes_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.pools_created.inc();
        metrics.record_error(true);
        let text = metrics.render().unwrap();
        assert!(text.contains("vmcluster_ipam_pools_created_total 1"));
        assert!(text.contains("vmcluster_ipam_reconcile_errors_total{kind=\"permanent\"} 1"));
    }

    #[tokio::test]
    async fn test_readyz_reflects_flag() {
        let ready = Arc::new(AtomicBool::new(false));
        let app = router(Metrics::new().unwrap(), ready.clone());

        let response = app
            .clone()
            .oneshot(Request::get("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        ready.store(true, Ordering::Relaxed);
        let response = app
            .oneshot(Request::get("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let metrics = Metrics::new().unwrap();
        metrics.reconciliations.inc();
        let app = router(metrics, Arc::new(AtomicBool::new(true)));

        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("vmcluster_ipam_reconciliations_total 1"));
    }
}
