//! Avatar video step of the highlight pipeline.

use std::path::Path;

use async_trait::async_trait;
use crickcast_videogen::{RenderError, RenderStage, RenderedVideo, VideoGenApiError, VideoGenService, WaitControl};

/// Renders a talking-avatar video over a commentary track.
#[async_trait]
pub trait AvatarVideoSource: Send + Sync {
    async fn render(
        &self,
        audio: &Path,
        title: &str,
        control: &WaitControl,
        on_stage: &(dyn Fn(RenderStage) + Send + Sync),
    ) -> Result<RenderedVideo, RenderError>;

    /// Fetch a finished video to `dest`, returning the byte count.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, VideoGenApiError>;
}

#[async_trait]
impl AvatarVideoSource for VideoGenService {
    async fn render(
        &self,
        audio: &Path,
        title: &str,
        control: &WaitControl,
        on_stage: &(dyn Fn(RenderStage) + Send + Sync),
    ) -> Result<RenderedVideo, RenderError> {
        VideoGenService::render(self, audio, title, control, on_stage).await
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, VideoGenApiError> {
        self.api().download(url, dest).await
    }
}
