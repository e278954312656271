use crate::{
    api::{admission, health},
    config::StoreFailurePolicy,
    limiter::AdmissionCounter,
    observability::{HealthChecker, MetricsRecorder},
};
use axum::{
    extract::{FromRef, MatchedPath, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub counter: Arc<AdmissionCounter>,
    pub health_checker: Arc<HealthChecker>,
    pub failure_policy: StoreFailurePolicy,
}

pub fn create_router(
    counter: Arc<AdmissionCounter>,
    failure_policy: StoreFailurePolicy,
    metrics_enabled: bool,
) -> Router {
    let health_checker = Arc::new(HealthChecker::new(counter.store().clone()));

    let state = AppState {
        counter,
        health_checker,
        failure_policy,
    };

    let mut router: Router<AppState> = Router::new()
        // Health endpoints
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/v1", v1_routes());

    if metrics_enabled {
        router = router
            .route("/metrics", get(health::metrics))
            .route_layer(middleware::from_fn(track_metrics));
    }

    router
        // Add middleware
        .layer(TraceLayer::new_for_http())
        // Add state
        .with_state(state)
}

fn v1_routes() -> Router<AppState> {
    Router::new()
        .route("/admit", post(admission::admit))
        .route(
            "/limits/:identifier",
            get(admission::get_window).delete(admission::delete_window),
        )
        .route("/limits/:identifier/penalty", post(admission::penalty))
        .route("/limits/:identifier/reward", post(admission::reward))
}

/// Count requests per matched route
async fn track_metrics(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;
    MetricsRecorder::record_http_request(&method, &path, response.status().as_u16());

    response
}
