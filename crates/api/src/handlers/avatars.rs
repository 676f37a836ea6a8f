use axum::extract::State;
use axum::Json;
use crickcast_videogen::messages::Avatar;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/avatars
pub async fn list_avatars(State(state): State<AppState>) -> AppResult<Json<DataResponse<Vec<Avatar>>>> {
    let avatars = state.video_api.list_avatars().await?;
    Ok(Json(DataResponse { data: avatars }))
}
