//! Admission-control middleware for axum services.
//!
//! Attach with [`axum::middleware::from_fn_with_state`]:
//!
//! ```no_run
//! use std::sync::Arc;
//! use axum::{middleware, routing::get, Router};
//! use loadgate::config::GateConfig;
//! use loadgate::gate::AdmissionGate;
//! use loadgate::lifecycle::Shutdown;
//!
//! let shutdown = Shutdown::new();
//! let gate = AdmissionGate::new(GateConfig::default(), &shutdown);
//! let app: Router = Router::new()
//!     .route("/api/users", get(|| async { "ok" }))
//!     .layer(middleware::from_fn_with_state(
//!         gate,
//!         loadgate::http::admission_middleware,
//!     ));
//! ```

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::gate::{Admission, AdmissionGate, Rejection};
use crate::observability::metrics::RequestOutcome;

/// Per-request admission check keyed by `"METHOD PATH"`.
///
/// Rejections become `503 Service Unavailable` with a `Retry-After` header
/// and a short reason body; the handler is never invoked. Admitted requests
/// run the handler under a monotonic timer and feed the measured latency
/// back through the gate.
pub async fn admission_middleware(
    State(gate): State<Arc<AdmissionGate>>,
    request: Request,
    next: Next,
) -> Response {
    let key = format!("{} {}", request.method(), request.uri().path());

    match gate.check(&key) {
        Admission::Skip => next.run(request).await,
        Admission::Reject(rejection) => rejection_response(&rejection),
        Admission::Admit(ticket) => {
            let start = Instant::now();
            let response = next.run(request).await;
            let latency = start.elapsed();

            // A 5xx still informs the tracker; failing-but-slow handlers
            // are exactly the overload signal we watch for.
            let outcome = if response.status().is_server_error() {
                RequestOutcome::Error
            } else {
                RequestOutcome::Success
            };
            gate.complete(ticket, latency, outcome);

            response
        }
    }
}

fn rejection_response(rejection: &Rejection) -> Response {
    let mut response = Response::new(Body::from(rejection.reason.as_str()));
    *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
    response.headers_mut().insert(
        header::RETRY_AFTER,
        HeaderValue::from(rejection.retry_after_secs),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::RejectReason;

    #[test]
    fn rejection_response_carries_status_header_and_body() {
        let response = rejection_response(&Rejection {
            reason: RejectReason::Critical,
            retry_after_secs: 5,
        });

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER),
            Some(&HeaderValue::from_static("5"))
        );
    }
}
