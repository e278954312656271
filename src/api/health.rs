use crate::errors::Result;
use crate::observability::{HealthChecker, HealthStatus, MetricsRecorder};
use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

/// GET /health/live - Process is up; the store is not consulted
pub async fn liveness(State(health_checker): State<Arc<HealthChecker>>) -> Json<HealthStatus> {
    Json(health_checker.liveness().await)
}

/// GET /health/ready - Store reachable; degraded reports keep their body
#[tracing::instrument(skip_all)]
pub async fn readiness(
    State(health_checker): State<Arc<HealthChecker>>,
) -> (StatusCode, Json<HealthStatus>) {
    let status = health_checker.readiness().await;

    if status.status == "ok" {
        return (StatusCode::OK, Json(status));
    }

    tracing::warn!(
        backend = %status.checks.store.backend,
        message = ?status.checks.store.message,
        "Readiness check degraded"
    );
    (StatusCode::SERVICE_UNAVAILABLE, Json(status))
}

/// GET /metrics - Prometheus text exposition
pub async fn metrics() -> Result<String> {
    Ok(MetricsRecorder::export()?)
}
