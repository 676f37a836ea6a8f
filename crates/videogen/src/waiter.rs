//! Completion wait: push first, then poll.
//!
//! ```text
//! NotStarted -> AwaitingPush -> Resolved
//!                    |
//!                    v
//!            FallbackPolling -> Resolved
//! ```
//!
//! `AwaitingPush` is entered only when push is enabled and a registered
//! [`PendingWait`] was supplied. A push timeout, a caller interrupt or an
//! abort while waiting for the push all fall back to polling. Only a
//! resolved outcome ever leaves [`CompletionWaiter::wait`].

use std::sync::Arc;
use std::time::Duration;

use crickcast_core::job::JobOutcome;
use crickcast_core::wait_config::WaitConfig;
use crickcast_events::PendingWait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::poller::{PollFailure, StatusPoller, StatusSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    NotStarted,
    AwaitingPush,
    FallbackPolling,
    Resolved,
}

/// Which channel produced the resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedVia {
    Push,
    Poll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Complete { result_reference: String },
    Failed { failure_reason: String },
    Aborted,
}

impl From<JobOutcome> for Resolution {
    fn from(outcome: JobOutcome) -> Self {
        match outcome {
            JobOutcome::Complete { result_reference } => Resolution::Complete { result_reference },
            JobOutcome::Failed { failure_reason } => Resolution::Failed { failure_reason },
        }
    }
}

impl From<Result<String, PollFailure>> for Resolution {
    fn from(result: Result<String, PollFailure>) -> Self {
        match result {
            Ok(result_reference) => Resolution::Complete { result_reference },
            Err(PollFailure::Aborted) => Resolution::Aborted,
            Err(e @ PollFailure::Transport(_)) => Resolution::Failed {
                failure_reason: e.to_string(),
            },
            Err(PollFailure::Failed(failure_reason)) => Resolution::Failed { failure_reason },
        }
    }
}

/// Final result of one wait, with the path it took.
#[derive(Debug, Clone)]
pub struct WaitOutcome {
    pub resolution: Resolution,
    pub via: ResolvedVia,
    /// Every state entered, in order, starting at `NotStarted`.
    pub states: Vec<WaitState>,
}

impl WaitOutcome {
    pub fn entered(&self, state: WaitState) -> bool {
        self.states.contains(&state)
    }
}

/// Caller-side controls for a running wait.
///
/// `interrupt` cuts the push wait short and moves on to polling. `abort`
/// does the same during the push wait and additionally stops polling at
/// the next gap between queries.
#[derive(Debug, Clone, Default)]
pub struct WaitControl {
    interrupt: CancellationToken,
    abort: CancellationToken,
}

impl WaitControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Controls whose abort side follows an existing token, e.g. a child
    /// of the process shutdown token.
    pub fn with_abort(abort: CancellationToken) -> Self {
        Self {
            interrupt: CancellationToken::new(),
            abort,
        }
    }

    pub fn interrupt(&self) {
        self.interrupt.cancel();
    }

    pub fn abort(&self) {
        self.abort.cancel();
    }

    pub fn abort_token(&self) -> &CancellationToken {
        &self.abort
    }
}

pub struct CompletionWaiter {
    push_enabled: bool,
    push_timeout: Duration,
    poller: StatusPoller,
    source: Arc<dyn StatusSource>,
}

impl CompletionWaiter {
    pub fn new(config: &WaitConfig, source: Arc<dyn StatusSource>) -> Self {
        Self {
            push_enabled: config.push_enabled,
            push_timeout: config.push_timeout,
            poller: StatusPoller::from_config(config),
            source,
        }
    }

    /// Block until `job_id` resolves.
    ///
    /// `push` is the wait registered before submission; pass `None` when
    /// the job was submitted without a webhook.
    pub async fn wait(
        &self,
        job_id: &str,
        push: Option<PendingWait>,
        control: &WaitControl,
    ) -> WaitOutcome {
        let mut states = vec![WaitState::NotStarted];

        let push = match push {
            Some(wait) if self.push_enabled => Some(wait),
            Some(wait) => {
                // Dropping the handle unregisters it.
                drop(wait);
                None
            }
            None => None,
        };

        if let Some(mut pending) = push {
            states.push(WaitState::AwaitingPush);
            tracing::info!(
                job_id,
                correlation_id = %pending.correlation_id(),
                timeout_secs = self.push_timeout.as_secs(),
                "Waiting for push notification",
            );

            let pushed = tokio::select! {
                biased;
                outcome = pending.recv() => outcome,
                _ = tokio::time::sleep(self.push_timeout) => {
                    tracing::warn!(job_id, "No push within timeout, falling back to polling");
                    None
                }
                _ = control.interrupt.cancelled() => {
                    tracing::info!(job_id, "Push wait interrupted, falling back to polling");
                    None
                }
                _ = control.abort.cancelled() => {
                    tracing::info!(job_id, "Push wait aborted, falling back to polling");
                    None
                }
            };

            if let Some(outcome) = pushed {
                tracing::info!(job_id, "Job resolved via push");
                states.push(WaitState::Resolved);
                return WaitOutcome {
                    resolution: outcome.into(),
                    via: ResolvedVia::Push,
                    states,
                };
            }
        } else {
            tracing::info!(job_id, "Push unavailable, polling for completion");
        }

        states.push(WaitState::FallbackPolling);
        let result = self
            .poller
            .poll_until_terminal(self.source.as_ref(), job_id, &control.abort)
            .await;

        states.push(WaitState::Resolved);
        WaitOutcome {
            resolution: result.into(),
            via: ResolvedVia::Poll,
            states,
        }
    }
}
