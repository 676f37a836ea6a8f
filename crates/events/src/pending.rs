//! Registry of in-flight waits, one per submitted job.
//!
//! Each entry owns the sending half of a `oneshot` channel. The channel is
//! both the write-once notification slot and the single-use signal: the
//! value is stored before the receiver is woken, and the receiver can only
//! observe it after wake-up. Taking the sender out of the entry on first
//! delivery makes every later delivery a detectable duplicate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crickcast_core::error::CoreError;
use crickcast_core::job::JobOutcome;
use crickcast_core::types::CorrelationId;
use tokio::sync::oneshot;

/// What happened to a delivered outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Stored in the slot and the waiter was signalled.
    Delivered,
    /// The slot was already written; this copy was dropped.
    Duplicate,
    /// No in-flight wait matches.
    Unmatched,
}

struct Entry {
    /// `None` once the slot has been written.
    sender: Option<oneshot::Sender<JobOutcome>>,
    job_id: Option<String>,
}

#[derive(Default)]
struct Inner {
    by_correlation: HashMap<CorrelationId, Entry>,
    by_job: HashMap<String, CorrelationId>,
}

/// Concurrent map of correlation id to pending wait.
///
/// Wrap in `Arc` and share between the submitting side and the listener.
#[derive(Default)]
pub struct PendingWaits {
    inner: Mutex<Inner>,
}

impl PendingWaits {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the maps half-updated,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Allocate a wait for `correlation_id`.
    ///
    /// Must happen before the job is submitted so a fast push cannot
    /// arrive ahead of its slot. Fails with `Conflict` if the id is
    /// already in flight.
    pub fn register(self: &Arc<Self>, correlation_id: CorrelationId) -> Result<PendingWait, CoreError> {
        let mut inner = self.lock();
        if inner.by_correlation.contains_key(&correlation_id) {
            return Err(CoreError::Conflict(format!(
                "correlation id '{correlation_id}' is already in flight"
            )));
        }
        let (tx, rx) = oneshot::channel();
        inner.by_correlation.insert(
            correlation_id.clone(),
            Entry {
                sender: Some(tx),
                job_id: None,
            },
        );
        Ok(PendingWait {
            correlation_id,
            receiver: rx,
            registry: Arc::clone(self),
        })
    }

    /// Record the remote job id once submission has returned it.
    pub fn bind_job(&self, correlation_id: &CorrelationId, job_id: &str) -> Result<(), CoreError> {
        let mut inner = self.lock();
        let entry = inner
            .by_correlation
            .get_mut(correlation_id)
            .ok_or_else(|| CoreError::NotFound {
                entity: "pending wait",
                id: correlation_id.to_string(),
            })?;
        let previous = entry.job_id.replace(job_id.to_string());
        if let Some(previous) = previous {
            inner.by_job.remove(&previous);
        }
        inner
            .by_job
            .insert(job_id.to_string(), correlation_id.clone());
        Ok(())
    }

    /// Route an outcome to its wait.
    ///
    /// Looks up by correlation id first and falls back to the job-id index,
    /// so a push that only names the job still finds its waiter.
    pub fn deliver(
        &self,
        correlation_id: Option<&CorrelationId>,
        job_id: Option<&str>,
        outcome: JobOutcome,
    ) -> Delivery {
        let mut inner = self.lock();

        let key = match correlation_id {
            Some(id) if inner.by_correlation.contains_key(id) => Some(id.clone()),
            _ => job_id.and_then(|job| inner.by_job.get(job).cloned()),
        };
        let Some(key) = key else {
            return Delivery::Unmatched;
        };
        let Some(entry) = inner.by_correlation.get_mut(&key) else {
            return Delivery::Unmatched;
        };

        match entry.sender.take() {
            Some(sender) => match sender.send(outcome) {
                Ok(()) => Delivery::Delivered,
                // Receiver already gone; the handle is mid-drop.
                Err(_) => Delivery::Unmatched,
            },
            None => Delivery::Duplicate,
        }
    }

    pub fn job_for(&self, correlation_id: &CorrelationId) -> Option<String> {
        self.lock()
            .by_correlation
            .get(correlation_id)
            .and_then(|e| e.job_id.clone())
    }

    pub fn correlation_for(&self, job_id: &str) -> Option<CorrelationId> {
        self.lock().by_job.get(job_id).cloned()
    }

    /// Number of in-flight waits.
    pub fn len(&self) -> usize {
        self.lock().by_correlation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, correlation_id: &CorrelationId) {
        let mut inner = self.lock();
        if let Some(entry) = inner.by_correlation.remove(correlation_id) {
            if let Some(job_id) = entry.job_id {
                inner.by_job.remove(&job_id);
            }
        }
    }
}

/// Read side of one registered wait. Dropping it unregisters the wait.
pub struct PendingWait {
    correlation_id: CorrelationId,
    receiver: oneshot::Receiver<JobOutcome>,
    registry: Arc<PendingWaits>,
}

impl PendingWait {
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Wait for the pushed outcome.
    ///
    /// Returns `None` only if the registry dropped the sender without
    /// writing, which does not happen while this handle is alive.
    pub async fn recv(&mut self) -> Option<JobOutcome> {
        (&mut self.receiver).await.ok()
    }

    /// Take the outcome if it has already arrived.
    pub fn try_recv(&mut self) -> Option<JobOutcome> {
        self.receiver.try_recv().ok()
    }
}

impl std::fmt::Debug for PendingWait {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingWait")
            .field("correlation_id", &self.correlation_id)
            .finish()
    }
}

impl Drop for PendingWait {
    fn drop(&mut self) {
        self.registry.remove(&self.correlation_id);
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn complete(url: &str) -> JobOutcome {
        JobOutcome::Complete {
            result_reference: url.to_string(),
        }
    }

    #[tokio::test]
    async fn repeated_deliveries_signal_once_with_first_payload() {
        let waits = Arc::new(PendingWaits::new());
        let id = CorrelationId::new("C1");
        let mut wait = waits.register(id.clone()).unwrap();

        assert_eq!(waits.deliver(Some(&id), None, complete("first")), Delivery::Delivered);
        for n in 0..5 {
            let outcome = complete(&format!("later-{n}"));
            assert_eq!(waits.deliver(Some(&id), None, outcome), Delivery::Duplicate);
        }

        assert_eq!(wait.recv().await, Some(complete("first")));
        assert!(wait.try_recv().is_none());
    }

    #[tokio::test]
    async fn delivery_right_after_register_is_not_lost() {
        let waits = Arc::new(PendingWaits::new());
        let id = CorrelationId::new("C2");
        let mut wait = waits.register(id.clone()).unwrap();

        let deliverer = Arc::clone(&waits);
        let pushed = id.clone();
        tokio::spawn(async move {
            deliverer.deliver(Some(&pushed), None, complete("https://v/2.mp4"));
        })
        .await
        .unwrap();

        assert_eq!(wait.recv().await, Some(complete("https://v/2.mp4")));
    }

    #[test]
    fn duplicate_registration_conflicts() {
        let waits = Arc::new(PendingWaits::new());
        let _first = waits.register(CorrelationId::new("C3")).unwrap();
        assert_matches!(
            waits.register(CorrelationId::new("C3")),
            Err(CoreError::Conflict(_))
        );
    }

    #[test]
    fn bidirectional_lookup_and_job_routing() {
        let waits = Arc::new(PendingWaits::new());
        let id = CorrelationId::new("C4");
        let mut wait = waits.register(id.clone()).unwrap();
        waits.bind_job(&id, "J4").unwrap();

        assert_eq!(waits.job_for(&id).as_deref(), Some("J4"));
        assert_eq!(waits.correlation_for("J4"), Some(id.clone()));

        let unknown = CorrelationId::new("not-ours");
        assert_eq!(
            waits.deliver(Some(&unknown), Some("J4"), complete("u")),
            Delivery::Delivered
        );
        assert_eq!(wait.try_recv(), Some(complete("u")));
    }

    #[test]
    fn bind_unknown_id_is_not_found() {
        let waits = PendingWaits::new();
        assert_matches!(
            waits.bind_job(&CorrelationId::new("nope"), "J"),
            Err(CoreError::NotFound { .. })
        );
    }

    #[test]
    fn dropping_handle_unregisters_both_directions() {
        let waits = Arc::new(PendingWaits::new());
        let id = CorrelationId::new("C5");
        let wait = waits.register(id.clone()).unwrap();
        waits.bind_job(&id, "J5").unwrap();
        assert_eq!(waits.len(), 1);

        drop(wait);

        assert!(waits.is_empty());
        assert!(waits.correlation_for("J5").is_none());
        assert_eq!(
            waits.deliver(Some(&id), Some("J5"), complete("late")),
            Delivery::Unmatched
        );
    }

    #[test]
    fn unknown_ids_are_unmatched() {
        let waits = PendingWaits::new();
        assert_eq!(
            waits.deliver(Some(&CorrelationId::new("ghost")), None, complete("x")),
            Delivery::Unmatched
        );
        assert_eq!(waits.deliver(None, None, complete("x")), Delivery::Unmatched);
    }
}
