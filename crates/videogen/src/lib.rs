//! Client and completion wait for the hosted avatar video service.
//!
//! Provides the REST wrapper, the fixed-interval [`StatusPoller`], the
//! push-then-poll [`CompletionWaiter`] and the [`VideoGenService`] that
//! ties submission and waiting together.

pub mod api;
pub mod backoff;
pub mod config;
pub mod messages;
pub mod poller;
pub mod service;
pub mod waiter;

pub use api::{VideoGenApi, VideoGenApiError};
pub use config::VideoGenConfig;
pub use poller::{PollFailure, StatusPoller, StatusSource};
pub use service::{RenderError, RenderStage, RenderedVideo, VideoGenService};
pub use waiter::{CompletionWaiter, Resolution, ResolvedVia, WaitControl, WaitOutcome, WaitState};
