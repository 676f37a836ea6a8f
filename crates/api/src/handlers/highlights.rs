//! Handlers for the `/highlights` resource.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use crickcast_core::error::CoreError;
use crickcast_pipeline::{ProgressEntry, StartOutcome};
use serde::Deserialize;
use serde_json::Value;
use tokio_util::io::ReaderStream;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `POST /highlights`. The year may be sent as a string or a number.
#[derive(Debug, Deserialize)]
pub struct StartHighlight {
    pub year: Option<Value>,
    pub match_number: Option<u32>,
}

impl StartHighlight {
    fn into_parts(self) -> Option<(String, u32)> {
        let year = match self.year? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        Some((year, self.match_number?))
    }
}

/// POST /api/v1/highlights
///
/// Returns 202 when a run starts and 200 when the final video already
/// exists. A run already in flight for the same match is a 409.
pub async fn start_highlight(
    State(state): State<AppState>,
    Json(input): Json<StartHighlight>,
) -> AppResult<Response> {
    let (year, match_number) = input
        .into_parts()
        .ok_or_else(|| AppError::BadRequest("Year and match number required".into()))?;

    let outcome = state.pipeline.start(&year, match_number).await?;
    let status = match outcome {
        StartOutcome::Started { .. } => StatusCode::ACCEPTED,
        StartOutcome::AlreadyExists { .. } => StatusCode::OK,
    };
    tracing::info!(job_id = %outcome.job_id(), status = %status, "Highlight requested");

    Ok((status, Json(DataResponse { data: outcome })).into_response())
}

/// GET /api/v1/highlights/{job_id}
pub async fn get_highlight(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<DataResponse<ProgressEntry>>> {
    let entry = state
        .pipeline
        .status(&job_id)
        .await?
        .ok_or_else(|| CoreError::NotFound {
            entity: "Highlight",
            id: job_id,
        })?;
    Ok(Json(DataResponse { data: entry }))
}

/// GET /api/v1/highlights/{job_id}/download
///
/// Streams the assembled video, or the plain avatar video when assembly
/// did not produce one.
pub async fn download_highlight(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Response> {
    let path = state.pipeline.video_file(&job_id).await?;

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;
    let file_size = file
        .metadata()
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .len();
    let stream = ReaderStream::new(file);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CONTENT_LENGTH, file_size.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"ipl_highlight_{job_id}.mp4\""),
        )
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::InternalError(e.to_string()))
}
