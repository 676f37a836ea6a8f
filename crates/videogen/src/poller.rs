//! Fixed-interval status polling.
//!
//! Each iteration sleeps one interval and then issues exactly one status
//! query. `pending` keeps the loop going; `complete` and `failed` end it.
//! By default a transport error ends it too; `transport_retries` allows
//! that many consecutive failures, retried with capped exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use crickcast_core::job::JobStatus;
use crickcast_core::wait_config::WaitConfig;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::api::VideoGenApiError;
use crate::backoff::{next_delay, BackoffConfig};

/// Anything that can report a job's current status.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn status(&self, job_id: &str) -> Result<JobStatus, VideoGenApiError>;
}

/// Why polling ended without a result reference.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollFailure {
    /// The service reported the job as failed.
    #[error("video generation failed: {0}")]
    Failed(String),

    /// Status could not be queried.
    #[error("status query failed: {0}")]
    Transport(String),

    /// Abort requested or the overall deadline passed.
    #[error("wait aborted")]
    Aborted,
}

#[derive(Debug, Clone)]
pub struct StatusPoller {
    interval: Duration,
    max_wait: Option<Duration>,
    transport_retries: u32,
    backoff: BackoffConfig,
}

impl StatusPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_wait: None,
            transport_retries: 0,
            backoff: BackoffConfig::capped_at(interval),
        }
    }

    pub fn from_config(config: &WaitConfig) -> Self {
        Self::new(config.poll_interval)
            .with_max_wait(config.poll_max_wait)
            .with_transport_retries(config.poll_transport_retries)
    }

    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_transport_retries(mut self, retries: u32) -> Self {
        self.transport_retries = retries;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll `job_id` until it reaches a terminal state.
    ///
    /// `abort` is only checked while sleeping between queries; a query in
    /// flight always runs to completion.
    pub async fn poll_until_terminal(
        &self,
        source: &dyn StatusSource,
        job_id: &str,
        abort: &CancellationToken,
    ) -> Result<String, PollFailure> {
        let deadline = self.max_wait.map(|max| Instant::now() + max);
        let mut delay = self.interval;
        let mut retry_delay: Option<Duration> = None;
        let mut consecutive_failures = 0u32;
        let mut queries = 0u32;

        loop {
            let mut wake = Instant::now() + delay;
            if let Some(deadline) = deadline {
                wake = wake.min(deadline);
            }

            tokio::select! {
                biased;
                _ = abort.cancelled() => {
                    tracing::info!(job_id, queries, "Polling aborted");
                    return Err(PollFailure::Aborted);
                }
                _ = sleep_until(wake) => {}
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                tracing::warn!(job_id, queries, "Polling deadline reached");
                return Err(PollFailure::Aborted);
            }

            queries += 1;
            match source.status(job_id).await {
                Ok(JobStatus::Complete { result_reference }) => {
                    tracing::info!(job_id, queries, "Job complete (via polling)");
                    return Ok(result_reference);
                }
                Ok(JobStatus::Failed { failure_reason }) => {
                    tracing::error!(job_id, queries, reason = %failure_reason, "Job failed (via polling)");
                    return Err(PollFailure::Failed(failure_reason));
                }
                Ok(JobStatus::Pending { raw }) => {
                    tracing::debug!(job_id, status = %raw, queries, "Job still pending");
                    consecutive_failures = 0;
                    retry_delay = None;
                    delay = self.interval;
                }
                Err(e) => {
                    if consecutive_failures >= self.transport_retries {
                        tracing::error!(job_id, queries, error = %e, "Status query failed, giving up");
                        return Err(PollFailure::Transport(e.to_string()));
                    }
                    consecutive_failures += 1;
                    let next = match retry_delay {
                        None => self.backoff.initial_delay,
                        Some(current) => next_delay(current, &self.backoff),
                    };
                    retry_delay = Some(next);
                    delay = next;
                    tracing::warn!(
                        job_id,
                        error = %e,
                        attempt = consecutive_failures,
                        delay_ms = next.as_millis() as u64,
                        "Status query failed, retrying",
                    );
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::testing::{transport_error, ScriptedSource};
    use super::*;

    const INTERVAL: Duration = Duration::from_secs(2);

    #[tokio::test(start_paused = true)]
    async fn converges_after_k_plus_one_queries_spaced_by_interval() {
        for k in [0usize, 1, 4] {
            let source = ScriptedSource::pending_then_complete(k, "https://video/J1.mp4");
            let start = Instant::now();

            let result = StatusPoller::new(INTERVAL)
                .poll_until_terminal(&source, "J1", &CancellationToken::new())
                .await;

            assert_eq!(result.unwrap(), "https://video/J1.mp4");
            assert_eq!(source.call_count(), k + 1);
            let calls = source.calls.lock().unwrap();
            for (i, at) in calls.iter().enumerate() {
                assert_eq!(at.duration_since(start), INTERVAL * (i as u32 + 1));
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_status_is_returned_immediately() {
        let source = ScriptedSource::new(vec![
            Ok(JobStatus::Pending { raw: "waiting".into() }),
            Ok(JobStatus::Failed {
                failure_reason: "avatar unavailable".into(),
            }),
        ]);
        let result = StatusPoller::new(INTERVAL)
            .poll_until_terminal(&source, "J2", &CancellationToken::new())
            .await;
        assert_eq!(result, Err(PollFailure::Failed("avatar unavailable".into())));
        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_is_fatal_by_default() {
        let source = ScriptedSource::new(vec![Err(transport_error()), Ok(JobStatus::Complete {
            result_reference: "never".into(),
        })]);
        let result = StatusPoller::new(INTERVAL)
            .poll_until_terminal(&source, "J3", &CancellationToken::new())
            .await;
        assert_matches!(result, Err(PollFailure::Transport(msg)) if msg.contains("503"));
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_retries_recover_from_transient_errors() {
        let source = ScriptedSource::new(vec![
            Err(transport_error()),
            Err(transport_error()),
            Ok(JobStatus::Complete {
                result_reference: "https://video/J4.mp4".into(),
            }),
        ]);
        let start = Instant::now();
        let result = StatusPoller::new(INTERVAL)
            .with_transport_retries(2)
            .poll_until_terminal(&source, "J4", &CancellationToken::new())
            .await;

        assert_eq!(result.unwrap(), "https://video/J4.mp4");
        let calls = source.calls.lock().unwrap();
        // interval, then backoff 1s, then 2s (capped at the interval)
        let offsets: Vec<u64> = calls.iter().map(|c| c.duration_since(start).as_secs()).collect();
        assert_eq!(offsets, [2, 3, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_are_consecutive_not_cumulative() {
        let source = ScriptedSource::new(vec![
            Err(transport_error()),
            Ok(JobStatus::Pending { raw: "processing".into() }),
            Err(transport_error()),
            Ok(JobStatus::Complete {
                result_reference: "ok".into(),
            }),
        ]);
        let result = StatusPoller::new(INTERVAL)
            .with_transport_retries(1)
            .poll_until_terminal(&source, "J5", &CancellationToken::new())
            .await;
        assert_eq!(result.unwrap(), "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_aborts_wait() {
        let source = ScriptedSource::pending_then_complete(100, "late");
        let start = Instant::now();
        let result = StatusPoller::new(INTERVAL)
            .with_max_wait(Some(Duration::from_secs(7)))
            .poll_until_terminal(&source, "J6", &CancellationToken::new())
            .await;

        assert_eq!(result, Err(PollFailure::Aborted));
        assert_eq!(start.elapsed(), Duration::from_secs(7));
        assert_eq!(source.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn abort_between_iterations() {
        let source = ScriptedSource::pending_then_complete(100, "late");
        let abort = CancellationToken::new();
        let trigger = abort.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let result = StatusPoller::new(INTERVAL)
            .poll_until_terminal(&source, "J7", &abort)
            .await;
        assert_eq!(result, Err(PollFailure::Aborted));
        assert_eq!(source.call_count(), 2);
    }

    #[test]
    fn from_config_copies_tunables() {
        let config = WaitConfig {
            poll_interval: Duration::from_secs(3),
            poll_max_wait: Some(Duration::from_secs(60)),
            poll_transport_retries: 4,
            ..WaitConfig::default()
        };
        let poller = StatusPoller::from_config(&config);
        assert_eq!(poller.interval(), Duration::from_secs(3));
        assert_eq!(poller.max_wait, Some(Duration::from_secs(60)));
        assert_eq!(poller.transport_retries, 4);
    }
}
