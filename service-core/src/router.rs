//! Layers shared by every service router.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{Method, Request, header},
    middleware::from_fn,
    response::IntoResponse,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{
    metrics::metrics_middleware,
    security_headers::security_headers_middleware,
    tracing::{REQUEST_ID_HEADER, RequestId, request_id_middleware},
};
use crate::observability::render_metrics;

/// Wrap a service router with body limit, metrics, request tracing,
/// request ids, security headers and CORS.
///
/// Layers run outermost-last, so the request id is assigned before the
/// trace span reads it.
pub fn with_common_layers(router: Router, max_body_bytes: usize) -> Router {
    router
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .extensions()
                    .get::<RequestId>()
                    .and_then(|id| id.0.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::HeaderName::from_static(REQUEST_ID_HEADER),
                ]),
        )
}

/// Handler for `GET /metrics`.
pub async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        render_metrics(),
    )
}
