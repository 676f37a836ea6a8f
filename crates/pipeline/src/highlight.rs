//! Highlight generation: match data to commentary, speech, avatar video and
//! the final scoreboard cut.
//!
//! Every stage reuses its artifact when the match folder already holds it,
//! so a failed run can be restarted and picks up where it stopped.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, Utc};
use crickcast_core::assembly::AssemblyInputs;
use crickcast_core::commentary::{build_match_prompt, clean_commentary_text, extract_commentary, render_commentary_file};
use crickcast_core::error::CoreError;
use crickcast_core::naming::{self, match_folder, video_title};
use crickcast_videogen::{RenderStage, WaitControl};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::assembler::Assembler;
use crate::avatar::AvatarVideoSource;
use crate::commentary::CommentaryGenerator;
use crate::error::PipelineError;
use crate::matches::{MatchCatalog, MatchRecord};
use crate::progress::{HighlightStage, ProgressEntry, ProgressStore};
use crate::speech::SpeechSynthesizer;

const ALREADY_EXISTS_MESSAGE: &str = "Final video already exists!";

/// Client-facing download location for a job's video.
pub fn download_path(job_id: &str) -> String {
    format!("/api/v1/highlights/{job_id}/download")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StartOutcome {
    Started { job_id: String },
    AlreadyExists { job_id: String },
}

impl StartOutcome {
    pub fn job_id(&self) -> &str {
        match self {
            Self::Started { job_id } | Self::AlreadyExists { job_id } => job_id,
        }
    }
}

/// External services the pipeline drives.
pub struct HighlightServices {
    pub commentary: Arc<dyn CommentaryGenerator>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub avatar: Arc<dyn AvatarVideoSource>,
    pub assembler: Arc<dyn Assembler>,
}

pub struct HighlightPipeline {
    catalog: MatchCatalog,
    output_dir: PathBuf,
    services: HighlightServices,
    progress: Arc<ProgressStore>,
    shutdown: CancellationToken,
}

impl HighlightPipeline {
    pub fn new(
        catalog: MatchCatalog,
        output_dir: impl Into<PathBuf>,
        services: HighlightServices,
        progress: Arc<ProgressStore>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            catalog,
            output_dir: output_dir.into(),
            services,
            progress,
            shutdown,
        }
    }

    pub fn catalog(&self) -> &MatchCatalog {
        &self.catalog
    }

    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    /// Start generating the highlight for one match in the background.
    ///
    /// Returns [`StartOutcome::AlreadyExists`] without doing any work when
    /// the final video is on disk, and a `Conflict` error when a run for
    /// the same match is still in flight.
    pub async fn start(self: &Arc<Self>, year: &str, match_number: u32) -> Result<StartOutcome, PipelineError> {
        let record = self.catalog.get(year, match_number).await?;
        let job_id = naming::job_id(year, match_number);
        let folder = self.folder_for(&record);

        if tokio::fs::try_exists(folder.join(naming::FINAL_VIDEO_FILE)).await? {
            self.progress.complete(
                &job_id,
                ALREADY_EXISTS_MESSAGE,
                download_path(&job_id),
                folder.display().to_string(),
            );
            return Ok(StartOutcome::AlreadyExists { job_id });
        }

        self.progress.begin(&job_id)?;
        tracing::info!(job_id = %job_id, folder = %folder.display(), "Highlight generation started");

        let pipeline = Arc::clone(self);
        let spawned_id = job_id.clone();
        tokio::spawn(async move {
            pipeline.execute(&spawned_id, &record, &folder).await;
        });

        Ok(StartOutcome::Started { job_id })
    }

    /// Run every stage for `record`, recording the result in the progress
    /// store.
    pub async fn execute(&self, job_id: &str, record: &MatchRecord, folder: &Path) {
        match self.run_stages(job_id, record, folder).await {
            Ok(message) => {
                tracing::info!(job_id = %job_id, "Highlight generation complete");
                self.progress.complete(
                    job_id,
                    message,
                    download_path(job_id),
                    folder.display().to_string(),
                );
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Highlight generation failed");
                self.progress.fail(job_id, e.to_string());
            }
        }
    }

    /// Current progress, falling back to a synthesised `complete` entry
    /// when the final video exists from an earlier run.
    pub async fn status(&self, job_id: &str) -> Result<Option<ProgressEntry>, PipelineError> {
        if let Some(entry) = self.progress.get(job_id) {
            return Ok(Some(entry));
        }
        let Some(folder) = self.resolve_folder(job_id).await? else {
            return Ok(None);
        };
        if tokio::fs::try_exists(folder.join(naming::FINAL_VIDEO_FILE)).await? {
            return Ok(Some(ProgressEntry::completed(
                job_id,
                ALREADY_EXISTS_MESSAGE,
                download_path(job_id),
                folder.display().to_string(),
            )));
        }
        Ok(None)
    }

    /// Video to serve for a completed job: the assembled cut when present,
    /// otherwise the plain avatar video.
    pub async fn video_file(&self, job_id: &str) -> Result<PathBuf, PipelineError> {
        let not_found = || CoreError::NotFound {
            entity: "Highlight",
            id: job_id.to_string(),
        };
        let entry = self.status(job_id).await?.ok_or_else(not_found)?;
        if entry.stage() != HighlightStage::Complete {
            return Err(CoreError::Validation("Video not ready yet".into()).into());
        }
        let folder = entry.match_folder.map(PathBuf::from).ok_or_else(not_found)?;

        for name in [naming::FINAL_VIDEO_FILE, naming::AVATAR_VIDEO_FILE] {
            let candidate = folder.join(name);
            if tokio::fs::try_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(CoreError::NotFound {
            entity: "Video file",
            id: job_id.to_string(),
        }
        .into())
    }

    fn folder_for(&self, record: &MatchRecord) -> PathBuf {
        match_folder(&self.output_dir, &record.year, record.number, &record.teams)
    }

    async fn resolve_folder(&self, job_id: &str) -> Result<Option<PathBuf>, PipelineError> {
        let Ok((year, number)) = naming::parse_job_id(job_id) else {
            return Ok(None);
        };
        match self.catalog.get(&year, number).await {
            Ok(record) => Ok(Some(self.folder_for(&record))),
            Err(PipelineError::Core(CoreError::NotFound { .. } | CoreError::Validation(_))) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn run_stages(&self, job_id: &str, record: &MatchRecord, folder: &Path) -> Result<String, PipelineError> {
        let progress = &self.progress;
        progress.update(job_id, HighlightStage::Starting, "Setting up...");
        tokio::fs::create_dir_all(folder).await?;

        progress.update(job_id, HighlightStage::SavingData, "Saving match data...");
        let match_data = serde_json::json!({
            "match_number": record.number,
            "year": record.year,
            "teams": record.teams,
            "match_data": record.data,
            "timestamp": Utc::now().to_rfc3339(),
        });
        tokio::fs::write(
            folder.join(naming::MATCH_DATA_FILE),
            serde_json::to_vec_pretty(&match_data)?,
        )
        .await?;

        let commentary = self.commentary_stage(job_id, record, folder).await?;
        let audio = self.audio_stage(job_id, &commentary, folder).await?;
        let video = self.video_stage(job_id, record, &audio, folder).await?;

        progress.update(job_id, HighlightStage::Scoreboards, "Looking for scoreboard images...");
        let scoreboard_first = existing(folder.join(naming::SCOREBOARD_FIRST_FILE)).await?;
        let scoreboard_second = existing(folder.join(naming::SCOREBOARD_SECOND_FILE)).await?;
        if scoreboard_first.is_none() && scoreboard_second.is_none() {
            progress.note(job_id, "No scoreboard images found; commentary only");
        }

        let final_video = folder.join(naming::FINAL_VIDEO_FILE);
        if tokio::fs::try_exists(&final_video).await? {
            progress.update(job_id, HighlightStage::LoadingFinalVideo, "Using existing final video...");
            return Ok("Complete! Highlight video generated successfully!".into());
        }

        progress.update(job_id, HighlightStage::Assembling, "Creating final video with scoreboards...");
        let inputs = AssemblyInputs {
            video,
            audio,
            scoreboard_first,
            scoreboard_second,
            work_dir: folder.join(naming::ASSEMBLY_WORK_DIR),
            output: final_video,
        };
        match self.services.assembler.assemble(&inputs).await {
            Ok(path) => {
                tracing::info!(job_id = %job_id, output = %path.display(), "Final video created");
                Ok("Complete! Highlight video with scoreboards generated successfully!".into())
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Video assembly failed; serving avatar video");
                Ok(format!("Complete! Video combining failed ({e}); serving the avatar video"))
            }
        }
    }

    async fn commentary_stage(&self, job_id: &str, record: &MatchRecord, folder: &Path) -> Result<String, PipelineError> {
        let path = folder.join(naming::COMMENTARY_TEXT_FILE);
        if tokio::fs::try_exists(&path).await? {
            self.progress
                .update(job_id, HighlightStage::LoadingCommentary, "Loading existing commentary...");
            let contents = tokio::fs::read_to_string(&path).await?;
            return Ok(extract_commentary(&contents));
        }

        self.progress
            .update(job_id, HighlightStage::GeneratingCommentary, "Generating AI commentary...");
        let prompt = build_match_prompt(&record.year, record.number, &serde_json::to_string_pretty(&record.data)?);
        let text = self.services.commentary.generate(&prompt).await?;
        let file = render_commentary_file(
            &record.year,
            record.number,
            &record.teams,
            Local::now().naive_local(),
            &text,
        );
        tokio::fs::write(&path, file).await?;
        Ok(text)
    }

    async fn audio_stage(&self, job_id: &str, commentary: &str, folder: &Path) -> Result<PathBuf, PipelineError> {
        let path = folder.join(naming::COMMENTARY_AUDIO_FILE);
        if tokio::fs::try_exists(&path).await? {
            self.progress
                .update(job_id, HighlightStage::LoadingAudio, "Using existing audio file...");
            return Ok(path);
        }

        self.progress
            .update(job_id, HighlightStage::GeneratingAudio, "Converting to speech...");
        self.services
            .speech
            .synthesize(&clean_commentary_text(commentary), &path)
            .await?;
        Ok(path)
    }

    async fn video_stage(
        &self,
        job_id: &str,
        record: &MatchRecord,
        audio: &Path,
        folder: &Path,
    ) -> Result<PathBuf, PipelineError> {
        let path = folder.join(naming::AVATAR_VIDEO_FILE);
        if tokio::fs::try_exists(&path).await? {
            self.progress
                .update(job_id, HighlightStage::LoadingVideo, "Using existing video file...");
            let source_url = match tokio::fs::read_to_string(folder.join(naming::VIDEO_URL_FILE)).await {
                Ok(contents) => naming::parse_video_url_file(&contents),
                Err(_) => None,
            };
            tracing::info!(job_id = %job_id, source_url = ?source_url, "Reusing existing avatar video");
            return Ok(path);
        }

        let progress = &self.progress;
        let on_stage = |stage: RenderStage| match stage {
            RenderStage::UploadingAudio => {
                progress.update(job_id, HighlightStage::UploadingAudio, "Uploading audio...")
            }
            RenderStage::Submitting => progress.update(
                job_id,
                HighlightStage::GeneratingVideo,
                "Generating AI video (this may take a few minutes)...",
            ),
            RenderStage::Waiting { job_id: video_id } => progress.update(
                job_id,
                HighlightStage::WaitingForVideo,
                format!("Waiting for video {video_id} to finish rendering..."),
            ),
        };

        let control = WaitControl::with_abort(self.shutdown.child_token());
        let title = video_title(&record.year, record.number, &record.teams);
        let rendered = self
            .services
            .avatar
            .render(audio, &title, &control, &on_stage)
            .await?;
        tokio::fs::write(
            folder.join(naming::VIDEO_URL_FILE),
            naming::render_video_url_file(&rendered.video_url, Local::now().naive_local()),
        )
        .await?;

        self.progress
            .update(job_id, HighlightStage::DownloadingVideo, "Downloading video...");
        let bytes = self.services.avatar.download(&rendered.video_url, &path).await?;
        tracing::info!(job_id = %job_id, video_id = %rendered.job_id, bytes, "Avatar video downloaded");
        Ok(path)
    }
}

async fn existing(path: PathBuf) -> Result<Option<PathBuf>, std::io::Error> {
    Ok(tokio::fs::try_exists(&path).await?.then_some(path))
}
