//! Per-job progress for highlight generation.
//!
//! Entries live in memory. Terminal entries (complete or error) are evicted
//! once they are older than the store's TTL; running entries are never
//! evicted.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crickcast_core::error::CoreError;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Pipeline stages, each with the status string and percentage clients see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightStage {
    Initializing,
    Starting,
    SavingData,
    LoadingCommentary,
    GeneratingCommentary,
    LoadingAudio,
    GeneratingAudio,
    UploadingAudio,
    GeneratingVideo,
    WaitingForVideo,
    LoadingVideo,
    DownloadingVideo,
    Scoreboards,
    LoadingFinalVideo,
    Assembling,
    Complete,
    Error,
}

impl HighlightStage {
    pub fn status(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Starting => "starting",
            Self::SavingData => "saving_data",
            Self::LoadingCommentary => "loading_commentary",
            Self::GeneratingCommentary => "generating_commentary",
            Self::LoadingAudio => "loading_audio",
            Self::GeneratingAudio => "generating_audio",
            Self::UploadingAudio => "uploading_audio",
            Self::GeneratingVideo => "generating_video",
            Self::WaitingForVideo => "processing_video",
            Self::LoadingVideo => "loading_video",
            Self::DownloadingVideo => "downloading_video",
            Self::Scoreboards => "loading_scoreboards",
            Self::LoadingFinalVideo => "loading_final_video",
            Self::Assembling => "combining_video",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    pub fn progress(self) -> u8 {
        match self {
            Self::Initializing => 0,
            Self::Starting => 5,
            Self::SavingData => 10,
            Self::LoadingCommentary | Self::GeneratingCommentary => 20,
            Self::LoadingAudio | Self::GeneratingAudio => 40,
            Self::UploadingAudio => 60,
            Self::GeneratingVideo => 70,
            Self::WaitingForVideo | Self::LoadingVideo => 80,
            Self::DownloadingVideo => 85,
            Self::Scoreboards => 90,
            Self::LoadingFinalVideo | Self::Assembling => 95,
            Self::Complete => 100,
            Self::Error => 0,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

/// Snapshot of one job's progress, serialised as-is by the API.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEntry {
    pub job_id: String,
    pub status: &'static str,
    pub progress: u8,
    pub message: String,
    pub video_url: Option<String>,
    pub error: Option<String>,
    pub match_folder: Option<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    stage: HighlightStage,
}

impl ProgressEntry {
    fn new(job_id: &str, stage: HighlightStage, message: impl Into<String>) -> Self {
        Self {
            job_id: job_id.to_string(),
            status: stage.status(),
            progress: stage.progress(),
            message: message.into(),
            video_url: None,
            error: None,
            match_folder: None,
            updated_at: Utc::now(),
            stage,
        }
    }

    /// A completed entry for a video that already exists on disk.
    pub fn completed(job_id: &str, message: impl Into<String>, video_url: String, match_folder: String) -> Self {
        let mut entry = Self::new(job_id, HighlightStage::Complete, message);
        entry.video_url = Some(video_url);
        entry.match_folder = Some(match_folder);
        entry
    }

    pub fn stage(&self) -> HighlightStage {
        self.stage
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }

    fn set_stage(&mut self, stage: HighlightStage, message: String) {
        self.stage = stage;
        self.status = stage.status();
        self.progress = stage.progress();
        self.message = message;
        self.updated_at = Utc::now();
    }
}

pub struct ProgressStore {
    entries: RwLock<HashMap<String, ProgressEntry>>,
    ttl: Duration,
}

impl ProgressStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Claim `job_id` for a new run. Fails if a run is already in flight.
    pub fn begin(&self, job_id: &str) -> Result<(), CoreError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = entries.get(job_id) {
            if !existing.is_terminal() {
                return Err(CoreError::Conflict(format!(
                    "Highlight {job_id} is already being generated ({})",
                    existing.status
                )));
            }
        }
        entries.insert(
            job_id.to_string(),
            ProgressEntry::new(job_id, HighlightStage::Initializing, "Starting generation..."),
        );
        Ok(())
    }

    pub fn update(&self, job_id: &str, stage: HighlightStage, message: impl Into<String>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let message = message.into();
        match entries.get_mut(job_id) {
            Some(entry) => entry.set_stage(stage, message),
            None => {
                entries.insert(job_id.to_string(), ProgressEntry::new(job_id, stage, message));
            }
        }
    }

    /// Change only the message, keeping the current stage.
    pub fn note(&self, job_id: &str, message: impl Into<String>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get_mut(job_id) {
            entry.message = message.into();
            entry.updated_at = Utc::now();
        }
    }

    pub fn complete(&self, job_id: &str, message: impl Into<String>, video_url: String, match_folder: String) {
        self.put(ProgressEntry::completed(job_id, message, video_url, match_folder));
    }

    pub fn fail(&self, job_id: &str, error: impl Into<String>) {
        let error = error.into();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let entry = entries
            .entry(job_id.to_string())
            .or_insert_with(|| ProgressEntry::new(job_id, HighlightStage::Error, ""));
        entry.set_stage(HighlightStage::Error, error.clone());
        entry.error = Some(error);
    }

    pub fn put(&self, entry: ProgressEntry) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(entry.job_id.clone(), entry);
    }

    pub fn get(&self, job_id: &str) -> Option<ProgressEntry> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(job_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop terminal entries last updated before `now - ttl`.
    ///
    /// A TTL too large to subtract from `now` never expires anything.
    pub fn evict_expired_at(&self, now: DateTime<Utc>) -> usize {
        let cutoff = chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_sub_signed(ttl));
        let Some(cutoff) = cutoff else {
            return 0;
        };
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_terminal() || entry.updated_at > cutoff);
        before - entries.len()
    }

    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(Utc::now())
    }

    /// Evict expired entries every `every` until `cancel` fires.
    pub async fn run_eviction(&self, every: Duration, cancel: CancellationToken) {
        tracing::info!(
            ttl_secs = self.ttl.as_secs(),
            interval_secs = every.as_secs(),
            "Progress eviction started"
        );
        let mut interval = tokio::time::interval(every);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Progress eviction stopping");
                    break;
                }
                _ = interval.tick() => {
                    let evicted = self.evict_expired();
                    if evicted > 0 {
                        tracing::info!(evicted, "Evicted finished highlight jobs");
                    } else {
                        tracing::debug!("No highlight jobs to evict");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn begin_rejects_running_job() {
        let store = ProgressStore::new(Duration::from_secs(60));
        store.begin("2024_1").unwrap();
        store.update("2024_1", HighlightStage::GeneratingAudio, "Converting to speech...");

        assert_matches!(store.begin("2024_1"), Err(CoreError::Conflict(_)));

        let entry = store.get("2024_1").unwrap();
        assert_eq!(entry.status, "generating_audio");
        assert_eq!(entry.progress, 40);
    }

    #[test]
    fn finished_job_can_restart() {
        let store = ProgressStore::new(Duration::from_secs(60));
        store.begin("2024_1").unwrap();
        store.fail("2024_1", "speech API error");
        let failed = store.get("2024_1").unwrap();
        assert_eq!(failed.status, "error");
        assert_eq!(failed.error.as_deref(), Some("speech API error"));

        store.begin("2024_1").unwrap();
        assert_eq!(store.get("2024_1").unwrap().status, "initializing");
    }

    #[test]
    fn note_keeps_stage() {
        let store = ProgressStore::new(Duration::from_secs(60));
        store.update("2024_2", HighlightStage::WaitingForVideo, "Waiting...");
        store.note("2024_2", "Still rendering");
        let entry = store.get("2024_2").unwrap();
        assert_eq!(entry.stage(), HighlightStage::WaitingForVideo);
        assert_eq!(entry.message, "Still rendering");
    }

    #[test]
    fn eviction_only_removes_old_terminal_entries() {
        let store = ProgressStore::new(Duration::from_secs(60));
        store.begin("running").unwrap();
        store.complete("done", "ok", "/download/done".into(), "folder".into());
        store.fail("failed", "boom");

        assert_eq!(store.evict_expired_at(Utc::now()), 0);

        let later = Utc::now() + chrono::Duration::seconds(120);
        assert_eq!(store.evict_expired_at(later), 2);
        assert!(store.get("running").is_some());
        assert!(store.get("done").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn huge_ttl_never_expires() {
        let store = ProgressStore::new(Duration::from_secs(u64::MAX / 4));
        store.fail("failed", "boom");
        assert_eq!(store.evict_expired_at(Utc::now()), 0);

        let store = ProgressStore::new(Duration::from_secs(i64::MAX as u64 / 1000));
        store.fail("failed", "boom");
        assert_eq!(store.evict_expired_at(Utc::now()), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn entry_serialises_without_stage() {
        let store = ProgressStore::new(Duration::from_secs(60));
        store.complete("2024_3", "Done", "/api/v1/highlights/2024_3/download".into(), "x".into());
        let json = serde_json::to_value(store.get("2024_3").unwrap()).unwrap();
        assert_eq!(json["status"], "complete");
        assert_eq!(json["progress"], 100);
        assert!(json.get("stage").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_loop_stops_on_cancel() {
        let store = std::sync::Arc::new(ProgressStore::new(Duration::ZERO));
        store.fail("old", "boom");
        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let store = store.clone();
            let cancel = cancel.clone();
            async move { store.run_eviction(Duration::from_secs(10), cancel).await }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(store.is_empty());
        cancel.cancel();
        task.await.unwrap();
    }
}
