//! Waits for a freshly created instance to reach a terminal state.
//!
//! The poller checks the instance status immediately, then once per interval
//! until the instance is `ACTIVE`, enters `ERROR`, or the deadline passes. A
//! failed status request is logged and retried on the next tick. Both the
//! status request and the pause between polls race against the caller's
//! [`Cancellation`].

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::backend::{ApiError, ApiFuture, Backend};
use crate::cancel::Cancellation;
use crate::model::{InstanceId, InstanceSnapshot, InstanceStatus};

/// Default pause between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default overall wait before giving up.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(600);

/// Reads the current status of an instance.
pub trait StatusProbe: Send + Sync {
    /// Fetches one status snapshot.
    fn probe<'a>(&'a self, instance_id: &'a InstanceId) -> ApiFuture<'a, InstanceSnapshot>;
}

/// Adapts a [`Backend`] into a [`StatusProbe`] using `get_server`.
#[derive(Debug)]
pub struct ServerStatusProbe<'a, B: ?Sized> {
    backend: &'a B,
}

impl<'a, B: Backend + ?Sized> ServerStatusProbe<'a, B> {
    /// Wraps `backend`.
    #[must_use]
    pub const fn new(backend: &'a B) -> Self {
        Self { backend }
    }
}

impl<B: Backend + ?Sized> StatusProbe for ServerStatusProbe<'_, B> {
    fn probe<'a>(&'a self, instance_id: &'a InstanceId) -> ApiFuture<'a, InstanceSnapshot> {
        self.backend.get_server(instance_id)
    }
}

/// Poll cadence and deadline.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollSettings {
    /// Pause between polls.
    pub interval: Duration,
    /// Overall deadline measured from the first poll.
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }
}

/// Result of waiting for activation.
#[derive(Clone, Debug, PartialEq)]
pub enum PollOutcome {
    /// The instance reached `ACTIVE`; carries the final snapshot.
    Active(InstanceSnapshot),
    /// The instance entered `ERROR`.
    Failed {
        /// Provider fault message, or a generic description.
        reason: String,
    },
    /// The deadline passed while the instance was still not terminal.
    TimedOut {
        /// Time spent waiting.
        elapsed: Duration,
        /// Last status observed, if any poll succeeded.
        last_status: Option<InstanceStatus>,
        /// Most recent failed status request, if any.
        last_error: Option<ApiError>,
    },
    /// The caller cancelled the wait.
    Cancelled,
}

/// Drives an instance from building to a terminal state.
#[derive(Debug)]
pub struct ActivationPoller<P> {
    probe: P,
    settings: PollSettings,
}

impl<P: StatusProbe> ActivationPoller<P> {
    /// Creates a poller using `probe` and `settings`.
    #[must_use]
    pub const fn new(probe: P, settings: PollSettings) -> Self {
        Self { probe, settings }
    }

    /// Polls until `instance_id` is terminal, the deadline passes, or
    /// `cancellation` fires.
    pub async fn wait(&self, instance_id: &InstanceId, cancellation: &Cancellation) -> PollOutcome {
        let started = Instant::now();
        let deadline = started + self.settings.timeout;
        let mut last_status = None;
        let mut last_error = None;
        let mut attempts: u32 = 0;

        loop {
            if cancellation.is_cancelled() {
                return PollOutcome::Cancelled;
            }

            attempts = attempts.saturating_add(1);
            let polled = tokio::select! {
                biased;
                () = cancellation.cancelled() => return PollOutcome::Cancelled,
                result = self.probe.probe(instance_id) => result,
            };

            match polled {
                Ok(snapshot) => match snapshot.status {
                    InstanceStatus::Active => {
                        info!(instance = %instance_id, attempts, "instance is active");
                        return PollOutcome::Active(snapshot);
                    }
                    InstanceStatus::Error => {
                        let reason = snapshot.fault_message().map_or_else(
                            || String::from("instance entered ERROR status"),
                            str::to_owned,
                        );
                        return PollOutcome::Failed { reason };
                    }
                    InstanceStatus::Building | InstanceStatus::Other(_) => {
                        debug!(instance = %instance_id, status = %snapshot.status, attempts, "instance not ready");
                        last_status = Some(snapshot.status);
                    }
                },
                Err(err) => {
                    warn!(instance = %instance_id, attempts, error = %err, "status poll failed; retrying");
                    last_error = Some(err);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return PollOutcome::TimedOut {
                    elapsed: now.duration_since(started),
                    last_status,
                    last_error,
                };
            }

            let pause = self.settings.interval.min(deadline.duration_since(now));
            tokio::select! {
                biased;
                () = cancellation.cancelled() => return PollOutcome::Cancelled,
                () = sleep(pause) => {}
            }
        }
    }
}
