//! Highlight assembly configuration and FFmpeg plan builder.
//!
//! The final highlight is the avatar video cut into three segments with
//! up to two scoreboard stills faded in between them, and the commentary
//! track muxed over the whole thing. [`AssemblyPlan::build`] turns an
//! [`AssemblyConfig`] plus the inputs on disk into the ordered list of
//! FFmpeg invocations; running them is the caller's job.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Timing and encoding parameters for highlight assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AssemblyConfig {
    /// Seconds of avatar video shown before each scoreboard.
    #[validate(range(min = 1.0, max = 60.0))]
    pub video_before_scoreboard_secs: f64,
    /// Seconds each scoreboard stays on screen.
    #[validate(range(min = 1.0, max = 30.0))]
    pub scoreboard_duration_secs: f64,
    /// Length of each crossfade.
    #[validate(range(min = 0.1, max = 5.0))]
    pub fade_duration_secs: f64,
    #[validate(range(min = 16, max = 7680))]
    pub width: u32,
    #[validate(range(min = 16, max = 4320))]
    pub height: u32,
    #[validate(range(min = 1, max = 120))]
    pub fps: u32,
    /// x264 constant rate factor.
    #[validate(range(max = 51))]
    pub crf: u8,
    #[validate(range(min = 32, max = 512))]
    pub audio_bitrate_kbps: u32,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            video_before_scoreboard_secs: 6.0,
            scoreboard_duration_secs: 5.0,
            fade_duration_secs: 0.5,
            width: 1920,
            height: 1080,
            fps: 25,
            crf: 23,
            audio_bitrate_kbps: 192,
        }
    }
}

impl AssemblyConfig {
    /// Load overrides from the environment on top of the defaults.
    ///
    /// | Env Var                               | Default     |
    /// |---------------------------------------|-------------|
    /// | `ASSEMBLY_VIDEO_BEFORE_SCOREBOARD_SECS` | `6`       |
    /// | `ASSEMBLY_SCOREBOARD_DURATION_SECS`   | `5`         |
    /// | `ASSEMBLY_FADE_DURATION_SECS`         | `0.5`       |
    /// | `ASSEMBLY_RESOLUTION`                 | `1920x1080` |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup("ASSEMBLY_VIDEO_BEFORE_SCOREBOARD_SECS") {
            config.video_before_scoreboard_secs =
                parse_secs("ASSEMBLY_VIDEO_BEFORE_SCOREBOARD_SECS", &raw)?;
        }
        if let Some(raw) = lookup("ASSEMBLY_SCOREBOARD_DURATION_SECS") {
            config.scoreboard_duration_secs =
                parse_secs("ASSEMBLY_SCOREBOARD_DURATION_SECS", &raw)?;
        }
        if let Some(raw) = lookup("ASSEMBLY_FADE_DURATION_SECS") {
            config.fade_duration_secs = parse_secs("ASSEMBLY_FADE_DURATION_SECS", &raw)?;
        }
        if let Some(raw) = lookup("ASSEMBLY_RESOLUTION") {
            let (width, height) = parse_resolution_str(&raw)?;
            config.width = width;
            config.height = height;
        }
        config.check()?;
        Ok(config)
    }

    /// Field ranges plus the cross-field rule that a fade must be shorter
    /// than both clips it joins.
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;
        if self.fade_duration_secs >= self.video_before_scoreboard_secs
            || self.fade_duration_secs >= self.scoreboard_duration_secs
        {
            return Err(CoreError::Validation(format!(
                "fade duration {}s must be shorter than both the video segment ({}s) and the scoreboard ({}s)",
                self.fade_duration_secs,
                self.video_before_scoreboard_secs,
                self.scoreboard_duration_secs
            )));
        }
        Ok(())
    }

    /// Scale-and-letterbox filter that brings any input to the output frame.
    pub fn scale_filter(&self) -> String {
        let (w, h) = (self.width, self.height);
        format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={}",
            self.fps
        )
    }
}

/// Parse a resolution string like `"1920x1080"` into `(width, height)`.
pub fn parse_resolution_str(s: &str) -> Result<(u32, u32), CoreError> {
    let parts: Vec<&str> = s.trim().split('x').collect();
    if parts.len() != 2 {
        return Err(CoreError::Validation(format!(
            "Invalid resolution format '{s}': expected WIDTHxHEIGHT"
        )));
    }
    let width = parts[0]
        .parse::<u32>()
        .map_err(|_| CoreError::Validation(format!("Invalid width in resolution '{s}'")))?;
    let height = parts[1]
        .parse::<u32>()
        .map_err(|_| CoreError::Validation(format!("Invalid height in resolution '{s}'")))?;
    if width == 0 || height == 0 {
        return Err(CoreError::Validation(format!(
            "Resolution dimensions must be > 0, got '{s}'"
        )));
    }
    Ok((width, height))
}

fn parse_secs(key: &str, raw: &str) -> Result<f64, CoreError> {
    raw.trim().parse::<f64>().map_err(|_| {
        CoreError::Validation(format!("{key} must be a number of seconds, got '{raw}'"))
    })
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Files that feed one assembly run.
#[derive(Debug, Clone)]
pub struct AssemblyInputs {
    /// Avatar video (`video.mp4`).
    pub video: PathBuf,
    /// Commentary track (`commentary.mp3`).
    pub audio: PathBuf,
    /// First-innings scoreboard still, if one was rendered.
    pub scoreboard_first: Option<PathBuf>,
    /// Second-innings scoreboard still, if one was rendered.
    pub scoreboard_second: Option<PathBuf>,
    /// Scratch directory for intermediate clips.
    pub work_dir: PathBuf,
    /// Final output file.
    pub output: PathBuf,
}

/// A single FFmpeg invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegStep {
    /// Short human-readable label for logs.
    pub description: String,
    pub args: Vec<String>,
}

/// How the plan combines the inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyMode {
    /// Segments and scoreboards joined with crossfades, then muxed.
    WithScoreboards,
    /// Commentary muxed straight onto the avatar video.
    AudioOnly,
}

/// Ordered FFmpeg invocations producing the final highlight.
#[derive(Debug, Clone)]
pub struct AssemblyPlan {
    pub mode: AssemblyMode,
    pub steps: Vec<FfmpegStep>,
    /// Expected length of the assembled video track in seconds.
    pub expected_duration_secs: f64,
}

impl AssemblyPlan {
    /// Build the plan for the given inputs.
    ///
    /// Falls back to [`AssemblyMode::AudioOnly`] when no scoreboard is
    /// present or when the avatar video is too short to leave a tail
    /// segment longer than one fade after the two leading segments.
    pub fn build(config: &AssemblyConfig, inputs: &AssemblyInputs, video_duration: f64) -> Self {
        let before = config.video_before_scoreboard_secs;
        let fade = config.fade_duration_secs;
        let tail = video_duration - before * 2.0;
        let has_scoreboard = inputs.scoreboard_first.is_some() || inputs.scoreboard_second.is_some();

        if !has_scoreboard || tail <= fade {
            return Self {
                mode: AssemblyMode::AudioOnly,
                steps: vec![mux_step(config, &inputs.video, &inputs.audio, &inputs.output)],
                expected_duration_secs: video_duration,
            };
        }

        let mut steps = Vec::new();
        let scale = config.scale_filter();

        let clip_first = inputs
            .scoreboard_first
            .as_ref()
            .map(|image| scoreboard_clip(config, &scale, image, &inputs.work_dir.join("scoreboard1_clip.mp4"), &mut steps));
        let clip_second = inputs
            .scoreboard_second
            .as_ref()
            .map(|image| scoreboard_clip(config, &scale, image, &inputs.work_dir.join("scoreboard2_clip.mp4"), &mut steps));

        let seg1 = inputs.work_dir.join("video_seg1.mp4");
        let seg2 = inputs.work_dir.join("video_seg2.mp4");
        let seg3 = inputs.work_dir.join("video_seg3.mp4");
        steps.push(segment_step(config, &scale, &inputs.video, 0.0, Some(before), &seg1, 1));
        steps.push(segment_step(config, &scale, &inputs.video, before, Some(before), &seg2, 2));
        steps.push(segment_step(config, &scale, &inputs.video, before * 2.0, None, &seg3, 3));

        // Clip order on the timeline, with each clip's duration.
        let mut clips: Vec<(PathBuf, f64)> = vec![(seg1, before)];
        if let Some(clip) = clip_first {
            clips.push((clip, config.scoreboard_duration_secs));
        }
        clips.push((seg2, before));
        if let Some(clip) = clip_second {
            clips.push((clip, config.scoreboard_duration_secs));
        }
        clips.push((seg3, tail));

        let durations: Vec<f64> = clips.iter().map(|(_, d)| *d).collect();
        let (filter, expected_duration_secs) = xfade_filter(&durations, fade);

        let silent = inputs.work_dir.join("final_video_no_audio.mp4");
        let mut args = vec!["-y".to_string()];
        for (path, _) in &clips {
            args.push("-i".into());
            args.push(path_arg(path));
        }
        args.extend([
            "-filter_complex".to_string(),
            filter,
            "-map".into(),
            "[vout]".into(),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "medium".into(),
            "-crf".into(),
            config.crf.to_string(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            path_arg(&silent),
        ]);
        steps.push(FfmpegStep {
            description: "Joining segments with fade transitions".into(),
            args,
        });

        steps.push(mux_step(config, &silent, &inputs.audio, &inputs.output));

        Self {
            mode: AssemblyMode::WithScoreboards,
            steps,
            expected_duration_secs,
        }
    }
}

/// Build an xfade chain over clips of the given durations.
///
/// Each transition starts one fade before the end of everything joined so
/// far, and each join shortens the running timeline by one fade. Returns
/// the filter graph and the resulting output duration.
pub fn xfade_filter(durations: &[f64], fade: f64) -> (String, f64) {
    let Some((&first, rest)) = durations.split_first() else {
        return (String::new(), 0.0);
    };

    let mut parts = Vec::with_capacity(rest.len());
    let mut timeline = first;
    let mut current = "[0:v]".to_string();

    for (i, duration) in rest.iter().enumerate() {
        let input_idx = i + 1;
        let offset = timeline - fade;
        let label = if input_idx == rest.len() {
            "[vout]".to_string()
        } else {
            format!("[v{input_idx}]")
        };
        parts.push(format!(
            "{current}[{input_idx}:v]xfade=transition=fade:duration={}:offset={}{label}",
            fmt_secs(fade),
            fmt_secs(offset)
        ));
        timeline += duration - fade;
        current = label;
    }

    (parts.join(";"), timeline)
}

/// Render seconds without trailing zeros (`5.0` -> `"5"`, `5.50` -> `"5.5"`).
pub fn fmt_secs(secs: f64) -> String {
    let s = format!("{secs:.3}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn scoreboard_clip(
    config: &AssemblyConfig,
    scale: &str,
    image: &Path,
    output: &Path,
    steps: &mut Vec<FfmpegStep>,
) -> PathBuf {
    let name = image
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    steps.push(FfmpegStep {
        description: format!("Creating video clip from {name}"),
        args: vec![
            "-y".into(),
            "-loop".into(),
            "1".into(),
            "-i".into(),
            path_arg(image),
            "-t".into(),
            fmt_secs(config.scoreboard_duration_secs),
            "-c:v".into(),
            "libx264".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-vf".into(),
            scale.to_string(),
            "-r".into(),
            config.fps.to_string(),
            path_arg(output),
        ],
    });
    output.to_path_buf()
}

fn segment_step(
    config: &AssemblyConfig,
    scale: &str,
    video: &Path,
    start: f64,
    length: Option<f64>,
    output: &Path,
    number: u8,
) -> FfmpegStep {
    let mut args = vec![
        "-y".to_string(),
        "-i".into(),
        path_arg(video),
        "-ss".into(),
        fmt_secs(start),
    ];
    if let Some(length) = length {
        args.push("-t".into());
        args.push(fmt_secs(length));
    }
    args.extend([
        "-vf".to_string(),
        scale.to_string(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "medium".into(),
        "-crf".into(),
        config.crf.to_string(),
        "-an".into(),
        path_arg(output),
    ]);
    FfmpegStep {
        description: format!("Extracting and scaling video segment {number}"),
        args,
    }
}

/// Copy the video stream and add the commentary, ending with the shorter input.
fn mux_step(config: &AssemblyConfig, video: &Path, audio: &Path, output: &Path) -> FfmpegStep {
    let args = vec![
        "-y".to_string(),
        "-i".into(),
        path_arg(video),
        "-i".into(),
        path_arg(audio),
        "-c:v".into(),
        "copy".into(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        format!("{}k", config.audio_bitrate_kbps),
        "-map".into(),
        "0:v:0".into(),
        "-map".into(),
        "1:a:0".into(),
        "-shortest".into(),
        path_arg(output),
    ];
    FfmpegStep {
        description: "Adding commentary audio to video".into(),
        args,
    }
}
