use axum::extract::{Path, State};
use axum::Json;
use crickcast_pipeline::MatchSummary;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/years
pub async fn list_years(State(state): State<AppState>) -> AppResult<Json<DataResponse<Vec<String>>>> {
    let years = state.pipeline.catalog().years().await?;
    Ok(Json(DataResponse { data: years }))
}

/// GET /api/v1/matches/{year}
///
/// Numbered matches for one season, labelled `Match n: A vs B`.
pub async fn list_matches(
    State(state): State<AppState>,
    Path(year): Path<String>,
) -> AppResult<Json<DataResponse<Vec<MatchSummary>>>> {
    let matches = state.pipeline.catalog().list(&year).await?;
    Ok(Json(DataResponse { data: matches }))
}
