//! Inbound push payload parsing.
//!
//! The video service has sent two shapes over time:
//!
//! ```json
//! {"event_type": "avatar_video.success", "event_data": {"video_id": "...", "url": "...", "callback_id": "..."}}
//! {"event_type": "video.complete", "callback_id": "...", "data": {"video_id": "...", "video_url": "..."}}
//! ```
//!
//! Both reduce to a [`PushPayload`]. Anything missing the event type or the
//! correlation id is malformed.

use crickcast_core::job::{JobOutcome, UNKNOWN_FAILURE_REASON};
use crickcast_core::types::CorrelationId;
use serde::Deserialize;

/// Event-type suffixes meaning the job finished with an artifact.
const COMPLETE_SUFFIXES: &[&str] = &["complete", "completed", "success"];

/// Event-type suffixes meaning the job failed.
const FAILED_SUFFIXES: &[&str] = &["failed", "fail", "error"];

/// Why a push payload was rejected.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PayloadError {
    /// Body is not a JSON object of the expected shape.
    #[error("invalid push payload: {0}")]
    Invalid(String),

    #[error("push payload has no event_type")]
    MissingEventType,

    #[error("push payload has no callback_id")]
    MissingCorrelationId,

    /// A completion event with nothing to download.
    #[error("completion push for '{0}' carries no video url")]
    MissingResultLocator(String),
}

/// Interpreted meaning of a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    Complete { result_reference: String },
    Failed { failure_reason: String },
    /// Event type we do not act on. Acknowledged and logged only.
    Other,
}

impl PushEvent {
    pub fn outcome(&self) -> Option<JobOutcome> {
        match self {
            PushEvent::Complete { result_reference } => Some(JobOutcome::Complete {
                result_reference: result_reference.clone(),
            }),
            PushEvent::Failed { failure_reason } => Some(JobOutcome::Failed {
                failure_reason: failure_reason.clone(),
            }),
            PushEvent::Other => None,
        }
    }
}

/// A structurally valid push notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushPayload {
    /// Event type exactly as sent.
    pub event_type: String,
    pub correlation_id: CorrelationId,
    /// Remote job id, when the sender included one.
    pub job_id: Option<String>,
    pub event: PushEvent,
}

// ---------------------------------------------------------------------------
// Wire shape
// ---------------------------------------------------------------------------

// Older and newer senders disagree on field names, and some send both
// spellings. Each spelling is its own field so a payload carrying both still
// parses; the first-listed one wins.

#[derive(Debug, Deserialize)]
struct RawPush {
    event_type: Option<String>,
    callback_id: Option<String>,
    correlation_id: Option<String>,
    event_data: Option<RawEventData>,
    data: Option<RawEventData>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEventData {
    video_id: Option<String>,
    url: Option<String>,
    video_url: Option<String>,
    error: Option<serde_json::Value>,
    msg: Option<serde_json::Value>,
    callback_id: Option<String>,
    correlation_id: Option<String>,
}

impl RawEventData {
    fn callback_id(&mut self) -> Option<String> {
        non_empty(self.callback_id.take()).or_else(|| self.correlation_id.take())
    }

    fn url(&mut self) -> Option<String> {
        non_empty(self.url.take()).or_else(|| self.video_url.take())
    }

    fn error(&mut self) -> Option<serde_json::Value> {
        self.error.take().filter(|e| !e.is_null()).or_else(|| self.msg.take())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl PushPayload {
    pub fn parse(value: &serde_json::Value) -> Result<Self, PayloadError> {
        if !value.is_object() {
            return Err(PayloadError::Invalid("body must be a JSON object".into()));
        }
        let raw = RawPush::deserialize(value).map_err(|e| PayloadError::Invalid(e.to_string()))?;
        let mut data = raw.event_data.or(raw.data).unwrap_or_default();

        let event_type = non_empty(raw.event_type).ok_or(PayloadError::MissingEventType)?;
        let correlation_id = non_empty(raw.callback_id)
            .or_else(|| non_empty(raw.correlation_id))
            .or_else(|| non_empty(data.callback_id()))
            .map(CorrelationId::new)
            .ok_or(PayloadError::MissingCorrelationId)?;

        let event = match classify(&event_type) {
            Kind::Complete => {
                let result_reference = non_empty(data.url())
                    .ok_or_else(|| PayloadError::MissingResultLocator(correlation_id.to_string()))?;
                PushEvent::Complete { result_reference }
            }
            Kind::Failed => PushEvent::Failed {
                failure_reason: data
                    .error()
                    .as_ref()
                    .and_then(error_message)
                    .unwrap_or_else(|| UNKNOWN_FAILURE_REASON.to_string()),
            },
            Kind::Other => PushEvent::Other,
        };

        Ok(Self {
            event_type,
            correlation_id,
            job_id: data.video_id.filter(|id| !id.is_empty()),
            event,
        })
    }
}

enum Kind {
    Complete,
    Failed,
    Other,
}

fn classify(event_type: &str) -> Kind {
    let normalized = event_type.trim().to_ascii_lowercase();
    let suffix = normalized.rsplit('.').next().unwrap_or(normalized.as_str());
    if COMPLETE_SUFFIXES.contains(&suffix) {
        Kind::Complete
    } else if FAILED_SUFFIXES.contains(&suffix) {
        Kind::Failed
    } else {
        Kind::Other
    }
}

/// Failure reasons arrive either as a plain string or as `{"message": ...}`.
pub fn error_message(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Object(map) => map
            .get("message")
            .or_else(|| map.get("detail"))
            .and_then(|m| m.as_str())
            .filter(|m| !m.is_empty())
            .map(str::to_string),
        _ => None,
    }
}
