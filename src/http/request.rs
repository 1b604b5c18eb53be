//! Request correlation and request logging.
//!
//! # Responsibilities
//! - Assign an `x-request-id` (UUID v4) when the client sends none
//! - Echo the id on the response
//! - Open one span per request carrying the id, method and path
//! - Emit one completion event per response
//! - Optionally run every request under a fixed logger ([`DispatchLayer`])
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The completion event carries only status and latency; method, path
//!   and request id come from the surrounding span

use std::task::{Context, Poll};
use std::time::Duration;

use axum::http::{Request, Response};
use tower::{Layer, Service};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::instrument::{WithDispatch, WithSubscriber};
use tracing::{Dispatch, Span};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates `x-request-id` for requests that arrive without one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

/// Copies `x-request-id` from the request onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

/// Span wrapping the whole request.
pub fn request_span<B>(request: &Request<B>) -> Span {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    )
}

/// Logs the request line once the response is ready.
pub fn log_response<B>(response: &Response<B>, latency: Duration, _span: &Span) {
    tracing::info!(
        status = response.status().as_u16(),
        elapsed_ms = latency.as_secs_f64() * 1000.0,
        "HTTP request completed"
    );
}

/// Runs the wrapped service, and the future it returns, with `dispatch` as
/// the default subscriber.
///
/// Connections are served on their own tasks, which do not inherit the
/// subscriber of the task that started the server.
#[derive(Clone)]
pub struct DispatchLayer {
    dispatch: Dispatch,
}

impl DispatchLayer {
    pub fn new(dispatch: Dispatch) -> Self {
        Self { dispatch }
    }
}

impl<S> Layer<S> for DispatchLayer {
    type Service = DispatchService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DispatchService {
            inner,
            dispatch: self.dispatch.clone(),
        }
    }
}

/// Service produced by [`DispatchLayer`].
#[derive(Clone)]
pub struct DispatchService<S> {
    inner: S,
    dispatch: Dispatch,
}

impl<S, R> Service<R> for DispatchService<S>
where
    S: Service<R>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = WithDispatch<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let inner = &mut self.inner;
        tracing::dispatcher::with_default(&self.dispatch, || inner.poll_ready(cx))
    }

    fn call(&mut self, request: R) -> Self::Future {
        // The request span is opened in `call`, before the future is polled.
        let inner = &mut self.inner;
        let future = tracing::dispatcher::with_default(&self.dispatch, || inner.call(request));
        future.with_subscriber(self.dispatch.clone())
    }
}
