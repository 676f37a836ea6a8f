//! Runs the FFmpeg assembly plan that overlays scoreboards and commentary.

use std::path::PathBuf;

use async_trait::async_trait;
use crickcast_core::assembly::{AssemblyConfig, AssemblyInputs, AssemblyMode, AssemblyPlan};
use crickcast_core::ffmpeg::{self, FfmpegError};

/// Combines the avatar video, commentary and scoreboards into one file.
#[async_trait]
pub trait Assembler: Send + Sync {
    /// Returns the path of the assembled video.
    async fn assemble(&self, inputs: &AssemblyInputs) -> Result<PathBuf, FfmpegError>;
}

pub struct FfmpegAssembler {
    config: AssemblyConfig,
}

impl FfmpegAssembler {
    pub fn new(config: AssemblyConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Assembler for FfmpegAssembler {
    async fn assemble(&self, inputs: &AssemblyInputs) -> Result<PathBuf, FfmpegError> {
        for required in [&inputs.video, &inputs.audio] {
            if !tokio::fs::try_exists(required).await? {
                return Err(FfmpegError::MediaNotFound(required.display().to_string()));
            }
        }

        let duration = ffmpeg::probe_duration(&inputs.video).await?;
        let plan = AssemblyPlan::build(&self.config, inputs, duration);
        tracing::info!(
            video_secs = duration,
            expected_secs = plan.expected_duration_secs,
            steps = plan.steps.len(),
            with_scoreboards = plan.mode == AssemblyMode::WithScoreboards,
            "Assembling final video",
        );

        if plan.mode == AssemblyMode::WithScoreboards {
            tokio::fs::create_dir_all(&inputs.work_dir).await?;
        }

        let result = run_steps(&plan).await;

        if plan.mode == AssemblyMode::WithScoreboards {
            if let Err(e) = tokio::fs::remove_dir_all(&inputs.work_dir).await {
                tracing::warn!(dir = %inputs.work_dir.display(), error = %e, "Failed to remove assembly work dir");
            }
        }

        result?;
        Ok(inputs.output.clone())
    }
}

async fn run_steps(plan: &AssemblyPlan) -> Result<(), FfmpegError> {
    for (i, step) in plan.steps.iter().enumerate() {
        tracing::debug!(step = i + 1, total = plan.steps.len(), "{}", step.description);
        ffmpeg::run_ffmpeg(&step.args).await?;
    }
    Ok(())
}
