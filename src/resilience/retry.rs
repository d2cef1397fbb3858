//! # Retry Converger
//!
//! Bounded polling for eventually-consistent external state. A probe is called
//! repeatedly with a fixed pause between calls until it reports convergence or
//! the timeout is reached.
//!
//! The pause before the last probe is clamped to the time left, so a probe
//! always runs at the deadline itself and a timed-out wait ends after at least
//! `timeout` and before `timeout + interval`.
//!
//! Probe errors are not retried: the first `Err` ends the wait and is returned
//! to the caller. Sleeps use `tokio::time`, so dropping the future cancels the
//! wait at once.

use crate::config::RetryConfig;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Result of a single probe: the state it observed, and whether that state is final
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome<S> {
    Converged(S),
    Pending(S),
}

impl<S> ProbeOutcome<S> {
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged(_))
    }

    pub fn into_snapshot(self) -> S {
        match self {
            Self::Converged(s) | Self::Pending(s) => s,
        }
    }
}

impl ProbeOutcome<()> {
    /// Outcome of a plain boolean predicate
    pub fn from_bool(converged: bool) -> Self {
        if converged {
            Self::Converged(())
        } else {
            Self::Pending(())
        }
    }
}

/// How a bounded wait ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Convergence<S> {
    Converged {
        snapshot: S,
        attempts: u32,
        elapsed: Duration,
    },
    TimedOut {
        /// State seen by the final probe
        last: S,
        attempts: u32,
        elapsed: Duration,
    },
}

impl<S> Convergence<S> {
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Converged { attempts, .. } | Self::TimedOut { attempts, .. } => *attempts,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            Self::Converged { elapsed, .. } | Self::TimedOut { elapsed, .. } => *elapsed,
        }
    }

    /// Last observed state, converged or not
    pub fn into_snapshot(self) -> S {
        match self {
            Self::Converged { snapshot, .. } => snapshot,
            Self::TimedOut { last, .. } => last,
        }
    }
}

/// Polls a probe at a fixed interval until it converges or times out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConverger {
    interval: Duration,
}

impl Default for RetryConverger {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

impl RetryConverger {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3);

    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.poll_interval())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll a boolean predicate; `Ok(false)` means the timeout elapsed first
    pub async fn retry<F, Fut, E>(&self, mut predicate: F, timeout: Duration) -> Result<bool, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
    {
        let result = self
            .converge(
                || {
                    let fut = predicate();
                    async move { fut.await.map(ProbeOutcome::from_bool) }
                },
                timeout,
            )
            .await?;

        Ok(result.is_converged())
    }

    /// Poll a probe that reports a snapshot of what it saw on every call.
    ///
    /// The probe holds no state between calls; the last snapshot is handed
    /// back to the caller whichever way the wait ends.
    pub async fn converge<S, F, Fut, E>(
        &self,
        mut probe: F,
        timeout: Duration,
    ) -> Result<Convergence<S>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ProbeOutcome<S>, E>>,
    {
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let outcome = probe().await?;
            let elapsed = started.elapsed();

            match outcome {
                ProbeOutcome::Converged(snapshot) => {
                    debug!(
                        attempts = attempts,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "✅ Probe converged"
                    );
                    return Ok(Convergence::Converged {
                        snapshot,
                        attempts,
                        elapsed,
                    });
                }
                ProbeOutcome::Pending(last) => {
                    if elapsed >= timeout {
                        warn!(
                            attempts = attempts,
                            elapsed_ms = elapsed.as_millis() as u64,
                            timeout_seconds = timeout.as_secs(),
                            "⏰ Probe did not converge before timeout"
                        );
                        return Ok(Convergence::TimedOut {
                            last,
                            attempts,
                            elapsed,
                        });
                    }

                    let pause = self.interval.min(timeout - elapsed);
                    debug!(
                        attempts = attempts,
                        pause_ms = pause.as_millis() as u64,
                        "⏳ Probe pending, waiting before next attempt"
                    );
                    tokio::time::sleep(pause).await;
                }
            }
        }
    }
}
