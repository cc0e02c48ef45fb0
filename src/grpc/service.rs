//! Admission-control tower layer for tonic servers.
//!
//! Attach with `Server::builder().layer(...)`:
//!
//! ```ignore
//! use loadgate::config::GateConfig;
//! use loadgate::gate::AdmissionGate;
//! use loadgate::grpc::AdmissionLayer;
//! use loadgate::lifecycle::Shutdown;
//!
//! let shutdown = Shutdown::new();
//! let gate = AdmissionGate::new(GateConfig::for_grpc(), &shutdown);
//! tonic::transport::Server::builder()
//!     .layer(AdmissionLayer::new(gate))
//!     .add_service(svc)
//!     .serve(addr)
//!     .await?;
//! ```
//!
//! Rejections are trailers-only gRPC responses: `RESOURCE_EXHAUSTED` for
//! overload levels, `UNAVAILABLE` for an open circuit, each carrying a
//! `retry-after` metadata entry with the hint in seconds. All rejection
//! metadata is built once at layer construction.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use http::{header, HeaderValue, Request, Response};
use tonic::body::{empty_body, BoxBody};
use tonic::Code;
use tower::{Layer, Service};

use crate::gate::{Admission, AdmissionGate, RejectReason, Rejection};
use crate::observability::metrics::RequestOutcome;

/// Pre-built header set for one rejection reason.
struct PreparedRejection {
    grpc_status: HeaderValue,
    grpc_message: HeaderValue,
    retry_after: HeaderValue,
}

impl PreparedRejection {
    fn new(code: Code, message: &'static str, retry_after_secs: u32) -> Self {
        Self {
            grpc_status: HeaderValue::from(code as i32),
            grpc_message: HeaderValue::from_static(message),
            retry_after: HeaderValue::from(retry_after_secs),
        }
    }

    /// Trailers-only response: HTTP 200 with the gRPC status in headers.
    fn response(&self) -> Response<BoxBody> {
        let mut response = Response::new(empty_body());
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/grpc"),
        );
        headers.insert("grpc-status", self.grpc_status.clone());
        headers.insert("grpc-message", self.grpc_message.clone());
        headers.insert("retry-after", self.retry_after.clone());
        response
    }
}

struct PreparedRejections {
    emergency: PreparedRejection,
    critical: PreparedRejection,
    circuit: PreparedRejection,
}

impl PreparedRejections {
    fn new(gate: &AdmissionGate) -> Self {
        Self {
            emergency: PreparedRejection::new(
                Code::ResourceExhausted,
                "service overloaded - emergency backpressure",
                gate.retry_after_secs(RejectReason::Emergency),
            ),
            critical: PreparedRejection::new(
                Code::ResourceExhausted,
                "service overloaded - critical backpressure",
                gate.retry_after_secs(RejectReason::Critical),
            ),
            circuit: PreparedRejection::new(
                Code::Unavailable,
                "service circuit breaker open",
                gate.retry_after_secs(RejectReason::CircuitOpen),
            ),
        }
    }

    fn response(&self, rejection: &Rejection) -> Response<BoxBody> {
        match rejection.reason {
            RejectReason::Emergency => self.emergency.response(),
            RejectReason::Critical => self.critical.response(),
            RejectReason::CircuitOpen => self.circuit.response(),
        }
    }
}

/// Tower layer wrapping a tonic server with latency-driven admission.
#[derive(Clone)]
pub struct AdmissionLayer {
    gate: Arc<AdmissionGate>,
    prepared: Arc<PreparedRejections>,
}

impl AdmissionLayer {
    pub fn new(gate: Arc<AdmissionGate>) -> Self {
        let prepared = Arc::new(PreparedRejections::new(&gate));
        Self { gate, prepared }
    }
}

impl<S> Layer<S> for AdmissionLayer {
    type Service = AdmissionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AdmissionService {
            inner,
            gate: Arc::clone(&self.gate),
            prepared: Arc::clone(&self.prepared),
        }
    }
}

/// The wrapped service produced by [`AdmissionLayer`].
#[derive(Clone)]
pub struct AdmissionService<S> {
    inner: S,
    gate: Arc<AdmissionGate>,
    prepared: Arc<PreparedRejections>,
}

impl<S, ReqBody> Service<Request<ReqBody>> for AdmissionService<S>
where
    S: Service<Request<ReqBody>, Response = Response<BoxBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = Response<BoxBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        // Swap in the clone: the original has had poll_ready driven.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let gate = Arc::clone(&self.gate);
        let prepared = Arc::clone(&self.prepared);

        Box::pin(async move {
            // Full method path, e.g. "/package.Service/Method".
            let key = request.uri().path().to_owned();

            match gate.check(&key) {
                Admission::Skip => inner.call(request).await,
                Admission::Reject(rejection) => Ok(prepared.response(&rejection)),
                Admission::Admit(ticket) => {
                    let start = Instant::now();
                    let result = inner.call(request).await;
                    let latency = start.elapsed();

                    let outcome = match &result {
                        Ok(response) => response_outcome(response),
                        Err(_) => RequestOutcome::Error,
                    };
                    gate.complete(ticket, latency, outcome);

                    result
                }
            }
        })
    }
}

/// Classify a gRPC response for metrics. A trailers-only error surfaces in
/// the headers; streaming statuses live in the trailers and are counted as
/// success here (their latency is what matters to the tracker).
fn response_outcome(response: &Response<BoxBody>) -> RequestOutcome {
    match response.headers().get("grpc-status") {
        Some(value) if value != "0" => RequestOutcome::Error,
        _ => RequestOutcome::Success,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::GateConfig;
    use crate::lifecycle::Shutdown;

    #[tokio::test]
    async fn prepared_rejections_carry_grpc_metadata() {
        let shutdown = Shutdown::new();
        let gate = AdmissionGate::new(GateConfig::for_grpc(), &shutdown);
        let prepared = PreparedRejections::new(&gate);

        let response = prepared.response(&Rejection {
            reason: RejectReason::Emergency,
            retry_after_secs: 10,
        });
        assert_eq!(response.status(), http::StatusCode::OK);
        assert_eq!(
            response.headers().get("grpc-status"),
            Some(&HeaderValue::from_static("8"))
        );
        assert_eq!(
            response.headers().get("retry-after"),
            Some(&HeaderValue::from_static("10"))
        );

        let circuit = prepared.response(&Rejection {
            reason: RejectReason::CircuitOpen,
            retry_after_secs: 30,
        });
        assert_eq!(
            circuit.headers().get("grpc-status"),
            Some(&HeaderValue::from_static("14"))
        );
        assert_eq!(
            circuit.headers().get("retry-after"),
            Some(&HeaderValue::from_static("30"))
        );
    }

    #[test]
    fn outcome_reads_trailers_only_status() {
        let mut response = Response::new(empty_body());
        assert_eq!(response_outcome(&response), RequestOutcome::Success);

        response
            .headers_mut()
            .insert("grpc-status", HeaderValue::from_static("0"));
        assert_eq!(response_outcome(&response), RequestOutcome::Success);

        response
            .headers_mut()
            .insert("grpc-status", HeaderValue::from_static("13"));
        assert_eq!(response_outcome(&response), RequestOutcome::Error);
    }
}
