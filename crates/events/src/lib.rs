//! Push-notification side of job completion.
//!
//! - [`PendingWaits`] keeps one single-use slot per in-flight job, keyed by
//!   correlation id with a secondary job-id index.
//! - [`NotificationListener`] validates inbound push payloads and routes
//!   them to the matching slot.
//! - [`EventBus`] fans completion events out in-process.
//! - [`CompletedVideoLog`] records every completed video it sees on the bus.
//! - [`PushArchive`] keeps the raw body of every inbound push on disk.

pub mod archive;
pub mod bus;
pub mod listener;
pub mod payload;
pub mod pending;
pub mod video_log;

pub use archive::PushArchive;
pub use bus::{EventBus, PlatformEvent};
pub use listener::{Ack, Disposition, NotificationListener};
pub use payload::{PayloadError, PushEvent, PushPayload};
pub use pending::{Delivery, PendingWait, PendingWaits};
pub use video_log::{CompletedVideo, CompletedVideoLog};
