//! Shared domain types for the crickcast highlight pipeline.
//!
//! Holds the job/outcome model used by both notification channels, the
//! wait and assembly configuration structs, FFmpeg process helpers and
//! the on-disk naming convention for match artifacts.

pub mod assembly;
pub mod commentary;
pub mod error;
pub mod ffmpeg;
pub mod job;
pub mod naming;
pub mod types;
pub mod wait_config;
