use std::sync::Arc;

use crickcast_events::{CompletedVideoLog, NotificationListener, PushArchive};
use crickcast_pipeline::HighlightPipeline;
use crickcast_videogen::VideoGenApi;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Inbound side of push completion.
    pub listener: NotificationListener,
    /// Raw push audit trail; `None` when archiving is off.
    pub push_archive: Option<PushArchive>,
    pub pipeline: Arc<HighlightPipeline>,
    pub video_log: Arc<CompletedVideoLog>,
    pub video_api: Arc<VideoGenApi>,
    /// Whether renders are submitted with a webhook.
    pub push_available: bool,
}
