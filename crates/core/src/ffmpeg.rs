//! FFmpeg/FFprobe process helpers.
//!
//! Every invocation is built as an argument vector and run through
//! [`tokio::process::Command`]; nothing goes through a shell.

use std::path::Path;

use serde::Deserialize;

/// Error type for FFmpeg/FFprobe operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffprobe/ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("media file not found: {0}")]
    MediaNotFound(String),
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output (`-print_format json -show_format -show_streams`).
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
    pub format: FfprobeFormat,
}

/// A single stream from ffprobe output.
#[derive(Debug, Deserialize)]
pub struct FfprobeStream {
    pub index: i32,
    pub codec_type: Option<String>,
    pub duration: Option<String>,
}

/// Format-level metadata from ffprobe.
#[derive(Debug, Deserialize)]
pub struct FfprobeFormat {
    pub duration: Option<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run `ffprobe` on a media file and return the parsed JSON output.
pub async fn probe_media(path: &Path) -> Result<FfprobeOutput, FfmpegError> {
    if !path.exists() {
        return Err(FfmpegError::MediaNotFound(
            path.to_string_lossy().to_string(),
        ));
    }

    let output = tokio::process::Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str::<FfprobeOutput>(&stdout)
        .map_err(|e| FfmpegError::ParseError(format!("{e}: {stdout}")))
}

/// Duration of a media file in seconds (0.0 when ffprobe reports none).
pub async fn probe_duration(path: &Path) -> Result<f64, FfmpegError> {
    let probe = probe_media(path).await?;
    Ok(parse_duration(&probe))
}

/// Run `ffmpeg` with the given arguments, surfacing stderr on failure.
pub async fn run_ffmpeg(args: &[String]) -> Result<(), FfmpegError> {
    let output = tokio::process::Command::new("ffmpeg")
        .args(args)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Parse the media duration in seconds from ffprobe output.
///
/// Prefers the container duration, then the first stream that has one.
pub fn parse_duration(probe: &FfprobeOutput) -> f64 {
    if let Some(secs) = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
    {
        return secs;
    }
    probe
        .streams
        .iter()
        .filter_map(|s| s.duration.as_deref())
        .find_map(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(json: &str) -> FfprobeOutput {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn format_duration_wins() {
        let p = probe(
            r#"{"streams":[{"index":0,"codec_type":"video","duration":"9.0"}],"format":{"duration":"12.5"}}"#,
        );
        assert_eq!(parse_duration(&p), 12.5);
    }

    #[test]
    fn falls_back_to_stream_duration() {
        let p = probe(
            r#"{"streams":[{"index":0,"codec_type":"audio"},{"index":1,"codec_type":"video","duration":"30.04"}],"format":{}}"#,
        );
        assert_eq!(parse_duration(&p), 30.04);
    }

    #[test]
    fn missing_durations_are_zero() {
        let p = probe(r#"{"format":{"duration":"N/A"}}"#);
        assert_eq!(parse_duration(&p), 0.0);
    }

    #[tokio::test]
    async fn probing_missing_file_is_media_not_found() {
        let err = probe_media(Path::new("/definitely/not/here.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, FfmpegError::MediaNotFound(_)));
    }
}
