//! On-disk audit trail of inbound pushes.
//!
//! Every push body that parses as JSON is written verbatim to
//! `{dir}/webhook_{YYYYmmdd_HHMMSS_mmm}_{event_type}.json` before it is
//! routed, so unmatched and late pushes can still be inspected afterwards.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// Writes raw push bodies into one directory.
#[derive(Debug, Clone)]
pub struct PushArchive {
    dir: PathBuf,
}

impl PushArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store `body` and return the file it went to.
    pub async fn store(&self, body: &serde_json::Value) -> std::io::Result<PathBuf> {
        self.store_at(body, Utc::now()).await
    }

    pub async fn store_at(
        &self,
        body: &serde_json::Value,
        received_at: DateTime<Utc>,
    ) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let event_type = body
            .get("event_type")
            .and_then(|t| t.as_str())
            .unwrap_or("unknown");
        let path = self.dir.join(file_name(event_type, received_at));

        let bytes = serde_json::to_vec_pretty(body).map_err(std::io::Error::other)?;
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(path = %path.display(), event_type, "Archived push");
        Ok(path)
    }
}

/// `avatar_video.success` at 12:00:05.042 becomes
/// `webhook_20240501_120005_042_avatar_video_success.json`.
fn file_name(event_type: &str, received_at: DateTime<Utc>) -> String {
    let event: String = event_type
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .take(64)
        .collect();
    let event = if event.is_empty() { "unknown".to_string() } else { event };
    format!("webhook_{}_{event}.json", received_at.format("%Y%m%d_%H%M%S_%3f"))
}
