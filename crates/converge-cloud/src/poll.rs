//! Poll-until-converged waits
//!
//! [`await_converged`] and [`await_removal`] observe a resource through an
//! accessor at a fixed interval until a terminal status, a failure, the deadline
//! or cancellation. Both sleep before the first observation and never have more
//! than one accessor call in flight.

use crate::error::{CloudError, Result};
use crate::kind::PollTiming;
use crate::status::{Progress, StatusClassifier, StatusSnapshot};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep_until, timeout};
use tokio_util::sync::CancellationToken;

type Predicate = Box<dyn Fn(&StatusSnapshot) -> Progress + Send + Sync>;

/// Stand-in deadline for timeouts too large to add to an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Configuration of a single wait
///
/// Built fresh for every reconciliation call. `interval > 0` and
/// `timeout > interval` hold for every constructed value.
pub struct PollSpec {
    interval: Duration,
    timeout: Duration,
    call_budget: f64,
    predicate: Predicate,
}

impl PollSpec {
    pub fn new<P>(interval: Duration, timeout: Duration, predicate: P) -> Result<Self>
    where
        P: Fn(&StatusSnapshot) -> Progress + Send + Sync + 'static,
    {
        if interval.is_zero() {
            return Err(CloudError::InvalidConfig(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if timeout <= interval {
            return Err(CloudError::InvalidConfig(format!(
                "poll timeout ({:?}) must be greater than the interval ({:?})",
                timeout, interval
            )));
        }

        Ok(Self {
            interval,
            timeout,
            call_budget: 1.0,
            predicate: Box::new(predicate),
        })
    }

    /// Wait until the classifier reports success, using the given timing
    pub fn until(classifier: StatusClassifier, timing: &PollTiming) -> Result<Self> {
        Self::new(timing.interval, timing.timeout, move |snapshot| {
            classifier.classify(&snapshot.status)
        })?
        .with_call_budget(timing.call_budget)
    }

    /// Limit each accessor call to this share of the remaining wait
    pub fn with_call_budget(mut self, call_budget: f64) -> Result<Self> {
        if !(call_budget > 0.0 && call_budget <= 1.0) {
            return Err(CloudError::InvalidConfig(format!(
                "call budget must be within (0, 1], got {}",
                call_budget
            )));
        }
        self.call_budget = call_budget;
        Ok(self)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn evaluate(&self, snapshot: &StatusSnapshot) -> Progress {
        (self.predicate)(snapshot)
    }

    /// Sub-timeout for one accessor call, never beyond the remaining wait
    fn call_timeout(&self, remaining: Duration) -> Duration {
        let floor = self.interval.min(remaining);
        remaining.mul_f64(self.call_budget).max(floor)
    }
}

impl std::fmt::Debug for PollSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollSpec")
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .field("call_budget", &self.call_budget)
            .finish_non_exhaustive()
    }
}

/// Result of a wait
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// The latest observation satisfied the target
    Converged(StatusSnapshot),
    /// Terminal failure; no further polling happened
    Failed(Failure),
    /// Deadline elapsed while the status was still transient
    TimedOut { last_status: Option<String> },
    /// The object can no longer be fetched (removal waits only)
    NotFound,
}

impl ReconcileOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, ReconcileOutcome::Converged(_))
    }
}

/// Why a wait failed
#[derive(Debug)]
pub enum Failure {
    /// Backend reported an error status
    Status {
        status: String,
        message: Option<String>,
    },
    /// The accessor itself returned an error
    Accessor(CloudError),
    /// The caller cancelled the wait
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitMode {
    Converge,
    Removal,
}

/// Poll until the spec's predicate reports success
///
/// A "not found" answer from the accessor is treated as not yet visible and
/// polling continues; any other accessor error fails the wait immediately.
pub async fn await_converged<F, Fut>(
    spec: &PollSpec,
    cancel: &CancellationToken,
    accessor: F,
) -> ReconcileOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<StatusSnapshot>>,
{
    poll(spec, cancel, accessor, WaitMode::Converge).await
}

/// Poll until the object is gone
///
/// A "not found" answer ends the wait with [`ReconcileOutcome::NotFound`]. A
/// status accepted by the predicate (e.g. "deleted") ends it with `Converged`.
pub async fn await_removal<F, Fut>(
    spec: &PollSpec,
    cancel: &CancellationToken,
    accessor: F,
) -> ReconcileOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<StatusSnapshot>>,
{
    poll(spec, cancel, accessor, WaitMode::Removal).await
}

async fn poll<F, Fut>(
    spec: &PollSpec,
    cancel: &CancellationToken,
    mut accessor: F,
    mode: WaitMode,
) -> ReconcileOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<StatusSnapshot>>,
{
    let deadline = after(Instant::now(), spec.timeout);
    let mut attempt = 0u32;
    let mut last_status: Option<String> = None;

    loop {
        let wake = after(Instant::now(), spec.interval).min(deadline);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(attempt, "wait cancelled while sleeping");
                return ReconcileOutcome::Failed(Failure::Cancelled);
            }
            _ = sleep_until(wake) => {}
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            tracing::warn!(attempt, last_status = ?last_status, "wait deadline elapsed");
            return ReconcileOutcome::TimedOut { last_status };
        }

        attempt += 1;
        let observed = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(attempt, "wait cancelled during accessor call");
                return ReconcileOutcome::Failed(Failure::Cancelled);
            }
            result = timeout(spec.call_timeout(remaining), accessor()) => result,
        };

        match observed {
            Err(_) => {
                tracing::warn!(attempt, "accessor call exceeded its time budget");
            }
            Ok(Err(e)) if e.is_not_found() => match mode {
                WaitMode::Removal => {
                    tracing::info!(attempt, "resource no longer exists");
                    return ReconcileOutcome::NotFound;
                }
                WaitMode::Converge => {
                    tracing::debug!(attempt, "resource not visible yet");
                }
            },
            Ok(Err(e)) => {
                tracing::warn!(attempt, error = %e, "accessor call failed");
                return ReconcileOutcome::Failed(Failure::Accessor(e));
            }
            Ok(Ok(snapshot)) => {
                tracing::debug!(attempt, status = %snapshot.status, "observed status");
                match spec.evaluate(&snapshot) {
                    Progress::Success => {
                        tracing::info!(attempt, status = %snapshot.status, "converged");
                        return ReconcileOutcome::Converged(snapshot);
                    }
                    Progress::Error(status) => {
                        tracing::warn!(attempt, status = %status, "backend reported error status");
                        return ReconcileOutcome::Failed(Failure::Status {
                            status,
                            message: snapshot.message,
                        });
                    }
                    Progress::Transient => last_status = Some(snapshot.status),
                }
            }
        }

        if Instant::now() >= deadline {
            tracing::warn!(attempt, last_status = ?last_status, "wait deadline elapsed");
            return ReconcileOutcome::TimedOut { last_status };
        }
    }
}

fn after(start: Instant, delay: Duration) -> Instant {
    start
        .checked_add(delay)
        .unwrap_or_else(|| start + FAR_FUTURE)
}
