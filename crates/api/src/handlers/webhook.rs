//! Inbound push notifications from the video service.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use crickcast_events::{Ack, PayloadError};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Acknowledgement body the sender expects for every well-formed push.
#[derive(Debug, Serialize)]
pub struct WebhookReceipt {
    pub status: &'static str,
    pub event_type: String,
    pub callback_id: String,
}

/// POST /webhook
///
/// Answers 200 for every structurally valid payload, including unknown
/// event types, unmatched ids and duplicates. Malformed bodies get 400.
///
/// Any body that parses as JSON is archived first, whatever happens to it
/// next. A failed archive write is logged and does not fail the push.
pub async fn receive(State(state): State<AppState>, body: Bytes) -> AppResult<Json<WebhookReceipt>> {
    let value: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::InvalidPayload(PayloadError::Invalid(e.to_string())))?;

    if let Some(archive) = &state.push_archive {
        if let Err(e) = archive.store(&value).await {
            tracing::error!(dir = %archive.dir().display(), error = %e, "Failed to archive push");
        }
    }

    match state.listener.on_receive(&value) {
        Ack::Accepted {
            event_type,
            correlation_id,
            disposition,
        } => {
            tracing::debug!(
                event_type = %event_type,
                correlation_id = %correlation_id,
                ?disposition,
                "Push acknowledged",
            );
            Ok(Json(WebhookReceipt {
                status: "received",
                event_type,
                callback_id: correlation_id.as_str().to_string(),
            }))
        }
        Ack::Rejected(e) => Err(e.into()),
    }
}
