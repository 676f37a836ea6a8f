//! Record of completed videos reported by push.
//!
//! [`CompletedVideoLog::run`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and keeps every `video.completed` event, optionally mirroring the list
//! to a JSON file so it survives restarts. Redelivered pushes for a video
//! already in the log are dropped.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;

use crate::bus::{PlatformEvent, VIDEO_COMPLETED};

/// One completed video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedVideo {
    pub video_id: Option<String>,
    pub video_url: String,
    pub callback_id: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl CompletedVideo {
    fn from_event(event: &PlatformEvent) -> Option<Self> {
        if event.event_type != VIDEO_COMPLETED {
            return None;
        }
        let video_url = event.payload.get("video_url")?.as_str()?.to_string();
        Some(Self {
            video_id: event.job_id.clone(),
            video_url,
            callback_id: event.correlation_id.clone(),
            completed_at: event.timestamp,
        })
    }

    /// Same push delivered again: same callback and video, or the same url
    /// when the sender gave no callback id.
    fn is_redelivery_of(&self, other: &CompletedVideo) -> bool {
        match (&self.callback_id, &other.callback_id) {
            (Some(a), Some(b)) => a == b && self.video_id == other.video_id,
            (None, None) => self.video_url == other.video_url,
            _ => false,
        }
    }
}

/// In-memory list of completed videos with an optional JSON mirror.
pub struct CompletedVideoLog {
    entries: RwLock<Vec<CompletedVideo>>,
    file: Option<PathBuf>,
}

impl CompletedVideoLog {
    /// Create an empty log, seeded from `file` if it exists.
    ///
    /// An unreadable or corrupt file is logged and treated as empty.
    pub async fn open(file: Option<PathBuf>) -> Self {
        let mut entries = Vec::new();
        if let Some(path) = &file {
            match tokio::fs::read(path).await {
                Ok(bytes) => match serde_json::from_slice::<Vec<CompletedVideo>>(&bytes) {
                    Ok(existing) => entries = existing,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable completed-video file");
                    }
                },
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to read completed-video file");
                }
            }
        }
        Self {
            entries: RwLock::new(entries),
            file,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            file: None,
        }
    }

    /// Snapshot of all recorded videos, oldest first.
    pub async fn list(&self) -> Vec<CompletedVideo> {
        self.entries.read().await.clone()
    }

    /// Append `video` unless it is already recorded. Returns whether it was added.
    pub async fn record(&self, video: CompletedVideo) -> bool {
        let snapshot = {
            let mut entries = self.entries.write().await;
            if entries.iter().any(|e| e.is_redelivery_of(&video)) {
                tracing::debug!(callback_id = ?video.callback_id, "Completed video already recorded");
                return false;
            }
            entries.push(video);
            entries.clone()
        };
        if let Some(path) = &self.file {
            if let Err(e) = write_json(path, &snapshot).await {
                tracing::error!(path = %path.display(), error = %e, "Failed to persist completed videos");
            }
        }
        true
    }

    /// Consume bus events until cancelled or the bus closes.
    pub async fn run(
        &self,
        mut receiver: broadcast::Receiver<PlatformEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Completed-video log stopping");
                    break;
                }
                received = receiver.recv() => match received {
                    Ok(event) => {
                        if let Some(video) = CompletedVideo::from_event(&event) {
                            tracing::info!(video_url = %video.video_url, callback_id = ?video.callback_id, "Recording completed video");
                            self.record(video).await;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Completed-video log lagged, some events were missed");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Event bus closed, completed-video log stopping");
                        break;
                    }
                },
            }
        }
    }
}

async fn write_json(path: &Path, videos: &[CompletedVideo]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let body = serde_json::to_vec_pretty(videos).map_err(std::io::Error::other)?;
    tokio::fs::write(path, body).await
}
