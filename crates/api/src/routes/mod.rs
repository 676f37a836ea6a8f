pub mod health;
pub mod highlights;
pub mod webhook;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /years                              available seasons
/// /matches/{year}                     numbered match list
///
/// /highlights                         start a highlight (POST)
/// /highlights/{job_id}                progress
/// /highlights/{job_id}/download       stream the finished video
///
/// /videos                             completed-video log
/// /avatars                            avatars on the video service
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/years", get(handlers::matches::list_years))
        .route("/matches/{year}", get(handlers::matches::list_matches))
        .nest("/highlights", highlights::router())
        .route("/videos", get(handlers::videos::list_completed))
        .route("/avatars", get(handlers::avatars::list_avatars))
}
