//! Inbound push handling.
//!
//! [`NotificationListener::on_receive`] never fails for a structurally valid
//! payload: unmatched, duplicate and unrecognised pushes are logged and
//! acknowledged so the sender does not keep retrying. Only malformed
//! payloads are rejected.
//!
//! A push is published on the bus only after it has been routed, and never
//! when it is a duplicate of one already delivered.

use std::sync::Arc;

use crickcast_core::error::CoreError;
use crickcast_core::types::CorrelationId;
use serde_json::json;

use crate::bus::{EventBus, PlatformEvent, VIDEO_COMPLETED, VIDEO_FAILED};
use crate::payload::{PayloadError, PushEvent, PushPayload};
use crate::pending::{Delivery, PendingWait, PendingWaits};

/// What the listener did with an accepted push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Written to a waiting slot.
    Delivered,
    /// The slot for this id was already written.
    Duplicate,
    /// No in-flight wait; the waiter may have fallen back to polling.
    Unmatched,
    /// Event type carries no outcome.
    Ignored,
}

/// Acknowledgement returned to the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    Accepted {
        event_type: String,
        correlation_id: CorrelationId,
        disposition: Disposition,
    },
    /// Malformed payload; the only client-error acknowledgement.
    Rejected(PayloadError),
}

impl Ack {
    pub fn is_success(&self) -> bool {
        matches!(self, Ack::Accepted { .. })
    }
}

/// Routes push notifications to pending waits and the event bus.
#[derive(Clone)]
pub struct NotificationListener {
    waits: Arc<PendingWaits>,
    bus: Arc<EventBus>,
}

impl NotificationListener {
    pub fn new(waits: Arc<PendingWaits>, bus: Arc<EventBus>) -> Self {
        Self { waits, bus }
    }

    pub fn waits(&self) -> &Arc<PendingWaits> {
        &self.waits
    }

    /// Allocate a wait for `correlation_id`. Call before submitting the job.
    pub fn register(&self, correlation_id: CorrelationId) -> Result<PendingWait, CoreError> {
        let wait = self.waits.register(correlation_id)?;
        tracing::debug!(correlation_id = %wait.correlation_id(), "Registered pending wait");
        Ok(wait)
    }

    pub fn on_receive(&self, body: &serde_json::Value) -> Ack {
        let payload = match PushPayload::parse(body) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected malformed push payload");
                return Ack::Rejected(e);
            }
        };

        let disposition = match payload.event.outcome() {
            None => {
                tracing::warn!(
                    event_type = %payload.event_type,
                    correlation_id = %payload.correlation_id,
                    "Ignoring push with unrecognised event type",
                );
                Disposition::Ignored
            }
            Some(outcome) => {
                let delivery = self.waits.deliver(
                    Some(&payload.correlation_id),
                    payload.job_id.as_deref(),
                    outcome,
                );
                match delivery {
                    Delivery::Delivered => {
                        tracing::info!(
                            event_type = %payload.event_type,
                            correlation_id = %payload.correlation_id,
                            job_id = ?payload.job_id,
                            "Push delivered to waiter",
                        );
                        Disposition::Delivered
                    }
                    Delivery::Duplicate => {
                        tracing::warn!(
                            correlation_id = %payload.correlation_id,
                            "Dropping duplicate push",
                        );
                        Disposition::Duplicate
                    }
                    Delivery::Unmatched => {
                        tracing::warn!(
                            correlation_id = %payload.correlation_id,
                            job_id = ?payload.job_id,
                            "Push has no matching wait",
                        );
                        Disposition::Unmatched
                    }
                }
            }
        };

        if disposition != Disposition::Duplicate {
            self.publish(&payload);
        }

        Ack::Accepted {
            event_type: payload.event_type,
            correlation_id: payload.correlation_id,
            disposition,
        }
    }

    fn publish(&self, payload: &PushPayload) {
        let event = match &payload.event {
            PushEvent::Complete { result_reference } => PlatformEvent::new(VIDEO_COMPLETED)
                .with_payload(json!({
                    "video_id": payload.job_id,
                    "video_url": result_reference,
                    "callback_id": payload.correlation_id,
                })),
            PushEvent::Failed { failure_reason } => PlatformEvent::new(VIDEO_FAILED)
                .with_payload(json!({
                    "video_id": payload.job_id,
                    "error": failure_reason,
                    "callback_id": payload.correlation_id,
                })),
            PushEvent::Other => return,
        };
        let event = event.with_correlation(payload.correlation_id.as_str());
        let event = match &payload.job_id {
            Some(job_id) => event.with_job(job_id.as_str()),
            None => event,
        };
        self.bus.publish(event);
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use crickcast_core::job::JobOutcome;
    use serde_json::json;

    use super::*;

    fn listener() -> NotificationListener {
        NotificationListener::new(Arc::new(PendingWaits::new()), Arc::new(EventBus::default()))
    }

    fn complete_push(id: &str, url: &str) -> serde_json::Value {
        json!({"event_type": "avatar_video.success", "event_data": {"url": url, "callback_id": id}})
    }

    #[tokio::test]
    async fn matched_push_resolves_waiter() {
        let listener = listener();
        let mut wait = listener.register(CorrelationId::new("C1")).unwrap();

        let ack = listener.on_receive(&complete_push("C1", "https://video/J1.mp4"));
        assert_matches!(ack, Ack::Accepted { disposition: Disposition::Delivered, .. });
        assert_eq!(
            wait.recv().await,
            Some(JobOutcome::Complete {
                result_reference: "https://video/J1.mp4".into()
            })
        );
    }

    #[test]
    fn unknown_id_is_acknowledged_without_state_change() {
        let listener = listener();
        let _other = listener.register(CorrelationId::new("mine")).unwrap();

        let ack = listener.on_receive(&complete_push("someone-else", "u"));
        assert!(ack.is_success());
        assert_matches!(ack, Ack::Accepted { disposition: Disposition::Unmatched, .. });
        assert_eq!(listener.waits().len(), 1);
    }

    #[tokio::test]
    async fn consumed_id_is_acknowledged_as_duplicate() {
        let listener = listener();
        let mut wait = listener.register(CorrelationId::new("C2")).unwrap();
        listener.on_receive(&complete_push("C2", "first"));
        wait.recv().await.unwrap();

        let ack = listener.on_receive(&complete_push("C2", "second"));
        assert_matches!(ack, Ack::Accepted { disposition: Disposition::Duplicate, .. });
    }

    #[test]
    fn after_waiter_gives_up_push_is_unmatched() {
        let listener = listener();
        let wait = listener.register(CorrelationId::new("C3")).unwrap();
        drop(wait);

        let ack = listener.on_receive(&complete_push("C3", "late"));
        assert_matches!(ack, Ack::Accepted { disposition: Disposition::Unmatched, .. });
        assert!(listener.waits().is_empty());
    }

    #[test]
    fn unrecognised_event_is_ignored_but_acknowledged() {
        let listener = listener();
        let ack = listener.on_receive(&json!({"event_type": "video.progress", "callback_id": "C4"}));
        assert_matches!(ack, Ack::Accepted { disposition: Disposition::Ignored, .. });
    }

    #[test]
    fn malformed_payload_is_rejected() {
        let ack = listener().on_receive(&json!({"event_data": {}}));
        assert_matches!(ack, Ack::Rejected(PayloadError::MissingEventType));
        assert!(!ack.is_success());
    }

    #[tokio::test]
    async fn duplicate_push_is_not_published_again() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let listener = NotificationListener::new(Arc::new(PendingWaits::new()), bus);
        let mut wait = listener.register(CorrelationId::new("C6")).unwrap();

        listener.on_receive(&complete_push("C6", "https://video/C6.mp4"));
        wait.recv().await.unwrap();
        let ack = listener.on_receive(&complete_push("C6", "https://video/C6.mp4"));
        assert_matches!(ack, Ack::Accepted { disposition: Disposition::Duplicate, .. });

        assert_eq!(rx.recv().await.unwrap().event_type, VIDEO_COMPLETED);
        assert_matches!(rx.try_recv(), Err(tokio::sync::broadcast::error::TryRecvError::Empty));
    }

    #[tokio::test]
    async fn completed_push_is_published() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let listener = NotificationListener::new(Arc::new(PendingWaits::new()), bus);

        listener.on_receive(&json!({
            "event_type": "video.complete",
            "callback_id": "C5",
            "data": {"video_id": "v5", "video_url": "https://video/v5.mp4"}
        }));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, VIDEO_COMPLETED);
        assert_eq!(event.job_id.as_deref(), Some("v5"));
        assert_eq!(event.payload["video_url"], "https://video/v5.mp4");
    }
}
