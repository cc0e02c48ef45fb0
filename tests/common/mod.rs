//! Shared utilities for the admission-control integration tests.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::{middleware, routing::get, Router};
use tower::ServiceExt;

use loadgate::config::GateConfig;
use loadgate::gate::AdmissionGate;
use loadgate::http::admission_middleware;
use loadgate::lifecycle::Shutdown;
use loadgate::observability::{NoopLogger, NoopMetrics};

/// Gate with the noop observers so test output stays clean.
pub fn quiet_gate(config: GateConfig, shutdown: &Shutdown) -> Arc<AdmissionGate> {
    AdmissionGate::with_observers(
        config,
        Arc::new(NoopMetrics),
        Arc::new(NoopLogger),
        shutdown,
    )
}

/// Thresholds scaled down so a test can trip every level with
/// millisecond-range samples.
#[allow(dead_code)]
pub fn tight_config() -> GateConfig {
    let mut config = GateConfig::default();
    config.thresholds.p99_emergency_ms = 50;
    config.thresholds.p95_critical_ms = 20;
    config.thresholds.ema_critical_ms = 10;
    config.thresholds.p95_moderate_ms = 10;
    config.thresholds.ema_warning_ms = 5;
    config.thresholds.slope_warning_ms = 1;
    config.enable_metrics = false;
    config
}

/// Router with a plain handler plus the admission middleware.
pub fn test_app(gate: Arc<AdmissionGate>) -> Router {
    Router::new()
        .route("/api/users", get(|| async { "OK" }))
        .route("/api/orders", get(|| async { "OK" }))
        .route("/health", get(|| async { "healthy" }))
        .layer(middleware::from_fn_with_state(gate, admission_middleware))
}

/// One in-process request through the router.
pub async fn send(app: &Router, method: Method, path: &str) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(path)
        .body(Body::empty())
        .expect("request builds");
    app.clone().oneshot(request).await.expect("router is infallible")
}

/// Prime an endpoint's tracker directly, bypassing the dispatcher, so a
/// scenario starts from a known statistical state.
pub fn prime(gate: &AdmissionGate, key: &str, latency: Duration, count: usize) {
    let tracker = gate.registry().get(key);
    for _ in 0..count {
        tracker.process(latency);
    }
}

/// Collect the response body as a string.
pub async fn body_string(response: Response<Body>) -> String {
    use http_body_util::BodyExt;
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}
