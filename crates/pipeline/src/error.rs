use crickcast_core::error::CoreError;
use crickcast_videogen::{RenderError, VideoGenApiError};

use crate::commentary::CommentaryError;
use crate::speech::SpeechError;

/// Errors raised while producing a highlight.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("commentary generation failed: {0}")]
    Commentary(#[from] CommentaryError),

    #[error("speech synthesis failed: {0}")]
    Speech(#[from] SpeechError),

    #[error("avatar video failed: {0}")]
    Render(#[from] RenderError),

    #[error("video download failed: {0}")]
    Download(#[from] VideoGenApiError),
}
