//! HTTP surface assembly.
//!
//! Two groups of routes share one outer stack:
//!
//! - browser-facing: `/health` and `/api/v1/*`, behind CORS;
//! - push: `/webhook`, called server-to-server by the video service, so no
//!   CORS and a small body cap.
//!
//! `main.rs` and `tests/common/mod.rs` both call [`build_app_router`].

use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultOnResponse, MakeSpan, TraceLayer};
use tracing::Level;

use crate::config::ServerConfig;
use crate::routes;
use crate::state::AppState;

/// Push notifications are a few hundred bytes; anything near this is not one.
pub const WEBHOOK_BODY_LIMIT: usize = 64 * 1024;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the application [`Router`].
///
/// Outermost first, every request passes through:
///
/// 1. request id assignment (kept if the caller sent one)
/// 2. a trace span tagged with that id
/// 3. request id echo on the response
/// 4. request timeout
/// 5. panic recovery
///
/// CORS and the webhook body cap sit inside that, on their own route group.
pub fn build_app_router(state: AppState, config: &ServerConfig) -> Router {
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    let browser = Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(build_cors_layer(config));

    let push = routes::webhook::router().layer(DefaultBodyLimit::max(WEBHOOK_BODY_LIMIT));

    Router::new()
        .merge(browser)
        .merge(push)
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(RequestIdSpan)
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .with_state(state)
}

/// Request span carrying the id set by [`SetRequestIdLayer`], so handler
/// logs (job ids, push callback ids) can be tied back to one request.
#[derive(Clone, Debug)]
pub struct RequestIdSpan;

impl<B> MakeSpan<B> for RequestIdSpan {
    fn make_span(&mut self, request: &Request<B>) -> tracing::Span {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");

        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

/// CORS for the dashboard: the configured origins may read the catalogue,
/// start highlights and poll their status.
///
/// Panics on an unparsable origin so a bad `CORS_ORIGINS` stops startup.
pub fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}
