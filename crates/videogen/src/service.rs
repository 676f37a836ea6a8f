//! Avatar rendering with push/poll completion.
//!
//! [`VideoGenService::render`] registers the pending wait *before* the job
//! is submitted, so a push that races the submission response still finds
//! its slot.

use std::path::Path;
use std::sync::Arc;

use crickcast_core::error::CoreError;
use crickcast_core::types::CorrelationId;
use crickcast_core::wait_config::WaitConfig;
use crickcast_events::NotificationListener;

use crate::api::{VideoGenApi, VideoGenApiError};
use crate::config::VideoGenConfig;
use crate::messages::{Dimension, GenerateRequest};
use crate::waiter::{CompletionWaiter, Resolution, ResolvedVia, WaitControl};

/// Progress points reported while rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderStage {
    UploadingAudio,
    Submitting,
    Waiting { job_id: String },
}

#[derive(Debug, Clone)]
pub struct RenderedVideo {
    pub job_id: String,
    /// Present when the job was submitted with a webhook.
    pub correlation_id: Option<CorrelationId>,
    pub video_url: String,
    pub via: ResolvedVia,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Api(#[from] VideoGenApiError),

    #[error(transparent)]
    Registry(#[from] CoreError),

    #[error("video generation failed: {0}")]
    Failed(String),

    #[error("wait aborted")]
    Aborted,
}

pub struct VideoGenService {
    api: Arc<VideoGenApi>,
    listener: NotificationListener,
    waiter: CompletionWaiter,
    config: VideoGenConfig,
    push_available: bool,
}

impl VideoGenService {
    pub fn new(config: VideoGenConfig, wait: &WaitConfig, listener: NotificationListener) -> Self {
        let api = Arc::new(VideoGenApi::new(&config));
        let push_available = config.push_available(wait);
        if wait.push_enabled && !push_available {
            tracing::warn!("PUSH_ENABLED is set but WEBHOOK_URL is not; completion will be polled");
        }
        Self {
            waiter: CompletionWaiter::new(wait, api.clone()),
            api,
            listener,
            config,
            push_available,
        }
    }

    pub fn api(&self) -> &VideoGenApi {
        &self.api
    }

    pub fn push_available(&self) -> bool {
        self.push_available
    }

    /// Upload `audio`, render the avatar against it and wait for the result.
    pub async fn render(
        &self,
        audio: &Path,
        title: &str,
        control: &WaitControl,
        on_stage: &(dyn Fn(RenderStage) + Send + Sync),
    ) -> Result<RenderedVideo, RenderError> {
        on_stage(RenderStage::UploadingAudio);
        let audio_url = self.api.upload_audio(audio).await?;
        tracing::info!(audio = %audio.display(), %audio_url, "Uploaded commentary audio");

        on_stage(RenderStage::Submitting);
        let mut request = GenerateRequest::avatar_with_audio(
            &self.config.avatar_id,
            &audio_url,
            Dimension {
                width: self.config.width,
                height: self.config.height,
            },
            title,
            self.config.test_mode,
        );

        let mut pending = None;
        if let (true, Some(webhook_url)) = (self.push_available, &self.config.webhook_url) {
            let correlation_id = CorrelationId::generate();
            pending = Some(self.listener.register(correlation_id.clone())?);
            request = request.with_webhook(correlation_id.as_str(), webhook_url);
        }

        // On failure `pending` drops here and unregisters itself.
        let job_id = self.api.submit_video(&request).await?;
        let correlation_id = pending.as_ref().map(|p| p.correlation_id().clone());
        if let Some(id) = &correlation_id {
            self.listener.waits().bind_job(id, &job_id)?;
        }
        tracing::info!(
            job_id = %job_id,
            correlation_id = ?correlation_id.as_ref().map(|c| c.as_str()),
            width = self.config.width,
            height = self.config.height,
            test_mode = self.config.test_mode,
            "Video generation started",
        );

        on_stage(RenderStage::Waiting {
            job_id: job_id.clone(),
        });
        let outcome = self.waiter.wait(&job_id, pending, control).await;

        match outcome.resolution {
            Resolution::Complete { result_reference } => Ok(RenderedVideo {
                job_id,
                correlation_id,
                video_url: result_reference,
                via: outcome.via,
            }),
            Resolution::Failed { failure_reason } => Err(RenderError::Failed(failure_reason)),
            Resolution::Aborted => Err(RenderError::Aborted),
        }
    }
}
