//! HTTP-level middleware (cross-cutting concerns).
//!
//! Responsibility:
//! - Request-Id generation + propagation (X-Request-Id)
//! - Access logging / request tracing (TraceLayer), with the request id on the span
//! - Body size limits
//! - Global timeouts
//!
//! Outbound calls have their own timeout on the HTTP client; the layer here only
//! bounds the request as a whole and is sized so the per-call timeouts fire first.

use std::time::Duration;

use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::http::{Request, header::HeaderName};
use tower::timeout::TimeoutLayer;
use tower::{BoxError, ServiceBuilder};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{MakeSpan, TraceLayer};
use tracing::Span;

use crate::error::AppError;

const REQUEST_ID_HEADER: &str = "x-request-id";

// JWKS + OBO + app token + 3 ACS calls
const OUTBOUND_CALLS_PER_REQUEST: u32 = 6;
const MIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Whole-request timeout for a given per-call upstream timeout.
pub fn request_timeout(upstream_timeout: Duration) -> Duration {
    (upstream_timeout * OUTBOUND_CALLS_PER_REQUEST + Duration::from_secs(5)).max(MIN_REQUEST_TIMEOUT)
}

/// Apply HTTP-level middleware to the given Router.
///
/// Defaults:
/// - Request-Id header: `x-request-id`
/// - Body limit: 64 KiB (the largest accepted body is `{ "AcsUserId": ... }`)
/// - Timeout: `request_timeout` (408 with the usual error body)
pub fn apply(router: Router, request_timeout: Duration) -> Router {
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    let layers = ServiceBuilder::new()
        // Make the service error `Infallible` by converting errors into responses.
        .layer(HandleErrorLayer::new(|err: BoxError| async move {
            if err.is::<tower::timeout::error::Elapsed>() {
                tracing::warn!("request timed out");
                AppError::RequestTimeout
            } else {
                tracing::error!(error = %err, "unhandled middleware error");
                AppError::Internal
            }
        }))
        // Generate a request id if missing, then propagate it to the response.
        .layer(SetRequestIdLayer::new(
            request_id_header.clone(),
            MakeRequestUuid,
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header))
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http().make_span_with(RequestSpan));

    router.layer(layers)
}

// Access-log span carrying the request id set above.
#[derive(Clone, Copy)]
struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, req: &Request<B>) -> Span {
        let request_id = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        tracing::info_span!(
            "request",
            method = %req.method(),
            path = %req.uri().path(),
            request_id = %request_id,
        )
    }
}
