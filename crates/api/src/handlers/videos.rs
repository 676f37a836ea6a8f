use axum::extract::State;
use axum::Json;
use crickcast_events::CompletedVideo;

use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/videos
///
/// Every video the service has reported complete through a push.
pub async fn list_completed(State(state): State<AppState>) -> Json<DataResponse<Vec<CompletedVideo>>> {
    Json(DataResponse {
        data: state.video_log.list().await,
    })
}
