use axum::routing::post;
use axum::Router;

use crate::handlers::webhook;
use crate::state::AppState;

/// Push endpoint registered with the video service (root level, not under
/// `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/webhook", post(webhook::receive))
}
