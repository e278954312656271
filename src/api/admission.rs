use crate::config::StoreFailurePolicy;
use crate::errors::{AppError, Result};
use crate::limiter::{apply_failure_policy, AdmissionCounter, Decision};
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct AdmitRequest {
    /// Caller identity, usually the client IP
    #[serde(default)]
    pub identifier: String,
    #[serde(default = "default_cost")]
    pub cost: u64,
}

fn default_cost() -> u64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct PointsRequest {
    pub points: u64,
}

/// POST /v1/admit - Consume points and decide
#[tracing::instrument(skip_all)]
pub async fn admit(
    State(counter): State<Arc<AdmissionCounter>>,
    State(policy): State<StoreFailurePolicy>,
    Json(request): Json<AdmitRequest>,
) -> Result<Response> {
    let settings = counter.settings();
    let result = counter.admit(&request.identifier, request.cost).await;
    let decision = apply_failure_policy(
        policy,
        result,
        settings.points,
        settings.window.as_secs(),
    )?;

    Ok(decision_response(decision))
}

/// GET /v1/limits/:identifier - Inspect the current window
pub async fn get_window(
    State(counter): State<Arc<AdmissionCounter>>,
    Path(identifier): Path<String>,
) -> Result<Json<Decision>> {
    counter
        .get(&identifier)
        .await?
        .map(Json)
        .ok_or(AppError::WindowNotFound)
}

/// DELETE /v1/limits/:identifier - Reset the window
pub async fn delete_window(
    State(counter): State<Arc<AdmissionCounter>>,
    Path(identifier): Path<String>,
) -> Result<StatusCode> {
    if counter.delete(&identifier).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::WindowNotFound)
    }
}

/// POST /v1/limits/:identifier/penalty - Charge extra points
pub async fn penalty(
    State(counter): State<Arc<AdmissionCounter>>,
    Path(identifier): Path<String>,
    Json(request): Json<PointsRequest>,
) -> Result<Json<Decision>> {
    Ok(Json(counter.penalty(&identifier, request.points).await?))
}

/// POST /v1/limits/:identifier/reward - Give points back
pub async fn reward(
    State(counter): State<Arc<AdmissionCounter>>,
    Path(identifier): Path<String>,
    Json(request): Json<PointsRequest>,
) -> Result<Json<Decision>> {
    Ok(Json(counter.reward(&identifier, request.points).await?))
}

/// 200 for admitted requests, 429 with Retry-After otherwise
fn decision_response(decision: Decision) -> Response {
    let mut headers = HeaderMap::new();
    add_rate_limit_headers(&mut headers, &decision);

    let status = if decision.allowed {
        StatusCode::OK
    } else {
        StatusCode::TOO_MANY_REQUESTS
    };

    (status, headers, Json(decision)).into_response()
}

/// Add rate limit headers to response
///
/// Quota headers are only sent when a real window backs the decision.
fn add_rate_limit_headers(headers: &mut HeaderMap, decision: &Decision) {
    if let Some(retry_after) = decision.retry_after_seconds {
        if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
            headers.insert(header::RETRY_AFTER, value);
        }
    }

    if !decision.has_quota() {
        return;
    }

    // X-RateLimit-Limit: Maximum number of points allowed in the window
    if let Ok(value) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert(HeaderName::from_static("x-ratelimit-limit"), value);
    }

    // X-RateLimit-Remaining: Points left in the window
    if let Ok(value) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert(HeaderName::from_static("x-ratelimit-remaining"), value);
    }

    // X-RateLimit-Reset: Seconds until the window resets
    let reset = decision.reset_after_ms.div_ceil(1000);
    if let Ok(value) = HeaderValue::from_str(&reset.to_string()) {
        headers.insert(HeaderName::from_static("x-ratelimit-reset"), value);
    }
}

#[cfg(test)]
mod tests {
    use crate::api::create_router;
    use crate::config::StoreFailurePolicy;
    use crate::errors::{AppError, Result};
    use crate::limiter::{AdmissionCounter, AdmissionSettings};
    use crate::store::{CounterRecord, CounterStore, InMemoryCounterStore};
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    struct OfflineStore;

    #[async_trait]
    impl CounterStore for OfflineStore {
        async fn increment_with_ttl(
            &self,
            _key: &str,
            _amount: i64,
            _ttl: Duration,
        ) -> Result<CounterRecord> {
            Err(AppError::StoreUnavailable("connection refused".to_string()))
        }

        async fn fetch(&self, _key: &str) -> Result<Option<CounterRecord>> {
            Err(AppError::StoreUnavailable("connection refused".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<bool> {
            Err(AppError::StoreUnavailable("connection refused".to_string()))
        }

        async fn ping(&self) -> Result<()> {
            Err(AppError::StoreUnavailable("connection refused".to_string()))
        }

        fn backend_name(&self) -> &'static str {
            "offline"
        }
    }

    fn settings(points: u64) -> AdmissionSettings {
        AdmissionSettings {
            key_prefix: "test:api".to_string(),
            points,
            window: Duration::from_secs(60),
            store_timeout: Duration::from_millis(250),
            enforce: true,
        }
    }

    fn app_with(store: Arc<dyn CounterStore>, points: u64, policy: StoreFailurePolicy) -> Router {
        let counter = Arc::new(AdmissionCounter::new(store, settings(points)));
        create_router(counter, policy, true)
    }

    fn app(points: u64) -> Router {
        app_with(
            Arc::new(InMemoryCounterStore::new()),
            points,
            StoreFailurePolicy::Propagate,
        )
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_admit_then_too_many_requests() {
        let app = app(2);

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(json_request(
                    Method::POST,
                    "/v1/admit",
                    json!({ "identifier": "1.2.3.4" }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(response.headers().get(header::RETRY_AFTER).is_none());
        }

        let response = app
            .oneshot(json_request(
                Method::POST,
                "/v1/admit",
                json!({ "identifier": "1.2.3.4" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let retry_after: u64 = response
            .headers()
            .get(header::RETRY_AFTER)
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!((1..=60).contains(&retry_after));

        let body = body_json(response).await;
        assert_eq!(body["allowed"], false);
        assert_eq!(body["retry_after_seconds"], retry_after);
    }

    #[tokio::test]
    async fn test_missing_identifier_is_bad_request() {
        let response = app(5)
            .oneshot(json_request(Method::POST, "/v1/admit", json!({ "cost": 1 })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["status"], 400);
    }

    #[tokio::test]
    async fn test_store_failure_policies() {
        let request = || json_request(Method::POST, "/v1/admit", json!({ "identifier": "ip" }));

        let response = app_with(Arc::new(OfflineStore), 5, StoreFailurePolicy::Propagate)
            .oneshot(request())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = app_with(Arc::new(OfflineStore), 5, StoreFailurePolicy::FailOpen)
            .oneshot(request())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app_with(Arc::new(OfflineStore), 5, StoreFailurePolicy::FailClosed)
            .oneshot(request())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "60");
        assert!(response.headers().get("x-ratelimit-limit").is_none());
        assert!(response.headers().get("x-ratelimit-remaining").is_none());

        let body = body_json(response).await;
        assert_eq!(body["bypassed"], false);
        assert_eq!(body["fallback"], true);
        assert_eq!(body["consumed"], 0);
    }

    #[tokio::test]
    async fn test_counted_denial_carries_quota_headers() {
        let app = app(1);
        let request = || json_request(Method::POST, "/v1/admit", json!({ "identifier": "ip" }));

        app.clone().oneshot(request()).await.unwrap();
        let response = app.oneshot(request()).await.unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("x-ratelimit-limit").unwrap(), "1");
        assert_eq!(response.headers().get("x-ratelimit-remaining").unwrap(), "0");
        assert!(response.headers().get("x-ratelimit-reset").is_some());
    }

    #[tokio::test]
    async fn test_oversized_cost_is_bad_request() {
        let app = app(5);

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/v1/admit",
                json!({ "identifier": "ip", "cost": u64::MAX }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/v1/limits/ip/reward",
                json!({ "points": u64::MAX }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // The window was never touched
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/limits/ip")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_window_management_routes() {
        let app = app(5);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/v1/limits/user-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/v1/limits/user-1/penalty",
                json!({ "points": 7 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["consumed"], 7);
        assert_eq!(body["allowed"], false);

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/v1/limits/user-1/reward",
                json!({ "points": 3 }),
            ))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["consumed"], 4);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/v1/limits/user-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["remaining"], 1);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/v1/limits/user-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/v1/limits/user-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let response = app(5)
            .oneshot(
                Request::builder()
                    .uri("/health/ready")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app_with(Arc::new(OfflineStore), 5, StoreFailurePolicy::Propagate)
            .oneshot(
                Request::builder()
                    .uri("/health/ready")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["checks"]["store"]["status"], "error");
        assert_eq!(body["checks"]["store"]["backend"], "offline");

        let response = app(5)
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
