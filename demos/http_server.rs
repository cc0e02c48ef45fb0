//! Demo HTTP server with latency-driven admission control.
//!
//! Run with `cargo run --example http_server`, then:
//!
//! ```text
//! curl -i http://127.0.0.1:3000/api/fast
//! curl -i http://127.0.0.1:3000/api/slow    # repeat to trip backpressure
//! curl -i http://127.0.0.1:3000/health     # always bypasses the gate
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use loadgate::config::GateConfig;
use loadgate::gate::AdmissionGate;
use loadgate::http::admission_middleware;
use loadgate::lifecycle::Shutdown;
use loadgate::observability::{RuntimeMetrics, TracingLogger};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();

    // Tight thresholds so the demo trips quickly; production setups keep
    // the defaults.
    let mut config = GateConfig::default();
    config.thresholds.ema_warning_ms = 50;
    config.thresholds.p95_moderate_ms = 150;
    config.thresholds.p95_critical_ms = 250;
    config.thresholds.ema_critical_ms = 100;
    config.thresholds.p99_emergency_ms = 400;
    config.metrics_interval_secs = 10;

    loadgate::observability::metrics::install_prometheus(
        "127.0.0.1:9090".parse().expect("valid metrics address"),
    );

    let gate = AdmissionGate::with_observers(
        config,
        Arc::new(RuntimeMetrics),
        Arc::new(TracingLogger),
        &shutdown,
    );

    let app = Router::new()
        .route("/api/fast", get(|| async { "fast response" }))
        .route(
            "/api/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                "slow response"
            }),
        )
        .route("/health", get(|| async { "healthy" }))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&gate),
            admission_middleware,
        ))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000")
        .await
        .expect("bind demo address");
    tracing::info!("demo server on http://127.0.0.1:3000");

    let mut stop = shutdown.watcher();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            stop.triggered().await;
        })
        .await
        .expect("server runs");

    // Let the dispatcher worker and reporter finish before exiting.
    shutdown.trigger();
    shutdown.drained().await;
}
