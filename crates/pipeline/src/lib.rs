//! Highlight generation pipeline.
//!
//! [`HighlightPipeline`] walks a match from its catalogue entry to a
//! finished video, reporting each stage to a shared [`ProgressStore`].
//! External services sit behind the [`CommentaryGenerator`],
//! [`SpeechSynthesizer`], [`AvatarVideoSource`] and [`Assembler`] traits.

pub mod assembler;
pub mod avatar;
pub mod commentary;
pub mod error;
pub mod highlight;
pub mod matches;
pub mod progress;
pub mod speech;

pub use assembler::{Assembler, FfmpegAssembler};
pub use avatar::AvatarVideoSource;
pub use commentary::{CommentaryConfig, CommentaryGenerator, GeminiClient};
pub use error::PipelineError;
pub use highlight::{download_path, HighlightPipeline, HighlightServices, StartOutcome};
pub use matches::{MatchCatalog, MatchRecord, MatchSummary};
pub use progress::{HighlightStage, ProgressEntry, ProgressStore};
pub use speech::{ElevenLabsClient, SpeechConfig, SpeechSynthesizer};
