use axum::routing::{get, post};
use axum::Router;

use crate::handlers::highlights;
use crate::state::AppState;

/// Routes mounted at `/highlights`.
///
/// ```text
/// POST   /                    -> start_highlight
/// GET    /{job_id}            -> get_highlight
/// GET    /{job_id}/download   -> download_highlight
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(highlights::start_highlight))
        .route("/{job_id}", get(highlights::get_highlight))
        .route("/{job_id}/download", get(highlights::download_highlight))
}
