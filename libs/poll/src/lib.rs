//! Polling primitives for asynchronous remote work.
//!
//! The system under test runs most operations as background tasks. This
//! library repeatedly queries their state until one of three outcomes:
//!
//! - **Success**: the success predicate holds on an observed state.
//! - **Remote failure**: the failure predicate holds. Returned at once, the
//!   remaining attempts are not waited out.
//! - **Timeout**: `max_attempts` observations were inconclusive.
//!
//! # Invariants
//!
//! - The query runs at most `max_attempts` times
//! - Delays between attempts never decrease
//! - No sleep follows the final attempt

use std::fmt;
use std::future::Future;
use std::time::Duration;

use satrig_id::PollId;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Error produced by a single query against the remote system.
pub type QueryError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Polling errors.
#[derive(Debug, Error)]
pub enum PollError<S> {
    /// The remote system explicitly reported failure.
    #[error("{query}: remote reported failure after {attempts} attempt(s): {state:?}")]
    RemoteTaskFailed {
        query: String,
        attempts: u32,
        state: S,
    },

    /// Attempts exhausted without success or failure.
    #[error("{query}: timed out after {attempts} attempt(s) in {elapsed:?}; last state: {last:?}")]
    Timeout {
        query: String,
        attempts: u32,
        elapsed: Duration,
        last: Option<S>,
    },

    /// The status query itself failed.
    #[error("{query}: query failed on attempt {attempt}: {source}")]
    Query {
        query: String,
        attempt: u32,
        #[source]
        source: QueryError,
    },
}

impl<S> PollError<S> {
    /// Returns true if attempts ran out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns true if the remote system reported failure.
    pub fn is_remote_failure(&self) -> bool {
        matches!(self, Self::RemoteTaskFailed { .. })
    }

    /// The last state observed before giving up, if any.
    pub fn last_state(&self) -> Option<&S> {
        match self {
            Self::RemoteTaskFailed { state, .. } => Some(state),
            Self::Timeout { last, .. } => last.as_ref(),
            Self::Query { .. } => None,
        }
    }

    /// Number of queries issued.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::RemoteTaskFailed { attempts, .. } | Self::Timeout { attempts, .. } => *attempts,
            Self::Query { attempt, .. } => *attempt,
        }
    }
}

/// Delay growth between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Same delay between every attempt.
    #[default]
    Fixed,

    /// Delay multiplied after every attempt. A multiplier below 1 acts as 1.
    Exponential { multiplier: u32 },
}

/// Polling configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay after the first attempt.
    pub interval: Duration,

    /// Upper bound on queries. Zero is treated as one.
    pub max_attempts: u32,

    /// Cap for backoff growth. Never lower than `interval`.
    pub max_interval: Duration,

    /// Delay growth.
    pub backoff: Backoff,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_interval: DEFAULT_MAX_INTERVAL,
            backoff: Backoff::Fixed,
        }
    }
}

impl PollConfig {
    /// Fixed-interval configuration.
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            max_interval: interval,
            backoff: Backoff::Fixed,
        }
    }

    /// Use the given backoff.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Cap backoff growth.
    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = max_interval;
        self
    }

    /// Override the attempt budget.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Attempt budget with the zero case folded to one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after the given 1-based attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let cap = self.max_interval.max(self.interval);
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential { multiplier } => {
                let multiplier = multiplier.max(1);
                let exponent = attempt.saturating_sub(1);
                let factor = multiplier.saturating_pow(exponent);
                self.interval.saturating_mul(factor).min(cap)
            }
        }
    }

    /// Worst-case time spent sleeping across all attempts.
    pub fn deadline(&self) -> Duration {
        (1..self.attempts())
            .map(|attempt| self.delay_after(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

/// Successful poll result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome<S> {
    /// The state that satisfied the success predicate.
    pub state: S,

    /// Number of queries issued.
    pub attempts: u32,

    /// Time from the first query to success.
    pub elapsed: Duration,
}

/// A single polling run.
///
/// Created and consumed by one call; nothing about it outlives the poll.
#[derive(Debug, Clone)]
pub struct PollTask {
    id: PollId,
    query: String,
    config: PollConfig,
    started_at: Instant,
}

impl PollTask {
    /// Create a poll task; `query` describes what is being checked.
    pub fn new(query: impl Into<String>, config: PollConfig) -> Self {
        Self {
            id: PollId::new(),
            query: query.into(),
            config,
            started_at: Instant::now(),
        }
    }

    /// Poll identifier used in logs.
    pub fn id(&self) -> PollId {
        self.id
    }

    /// Description of the query.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Polling configuration.
    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Run the poll.
    ///
    /// `failed` is evaluated before `succeeded`, so a state matching both
    /// counts as a failure.
    pub async fn run<S, E, F, Fut, P, Q>(
        mut self,
        mut check: F,
        succeeded: P,
        failed: Q,
    ) -> Result<PollOutcome<S>, PollError<S>>
    where
        S: fmt::Debug,
        E: Into<QueryError>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<S, E>>,
        P: Fn(&S) -> bool,
        Q: Fn(&S) -> bool,
    {
        let max_attempts = self.config.attempts();
        self.started_at = Instant::now();
        let mut last = None;

        debug!(
            poll_id = %self.id,
            query = %self.query,
            max_attempts,
            interval_ms = self.config.interval.as_millis() as u64,
            "Starting poll"
        );

        for attempt in 1..=max_attempts {
            let state = match check().await {
                Ok(state) => state,
                Err(e) => {
                    let source: QueryError = e.into();
                    warn!(
                        poll_id = %self.id,
                        query = %self.query,
                        attempt,
                        error = %source,
                        "Poll query failed"
                    );
                    return Err(PollError::Query {
                        query: self.query,
                        attempt,
                        source,
                    });
                }
            };

            if failed(&state) {
                warn!(
                    poll_id = %self.id,
                    query = %self.query,
                    attempt,
                    state = ?state,
                    "Remote reported failure"
                );
                return Err(PollError::RemoteTaskFailed {
                    query: self.query,
                    attempts: attempt,
                    state,
                });
            }

            if succeeded(&state) {
                let elapsed = self.started_at.elapsed();
                info!(
                    poll_id = %self.id,
                    query = %self.query,
                    attempts = attempt,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Poll succeeded"
                );
                return Ok(PollOutcome {
                    state,
                    attempts: attempt,
                    elapsed,
                });
            }

            debug!(poll_id = %self.id, attempt, state = ?state, "Not ready yet");
            last = Some(state);

            if attempt < max_attempts {
                tokio::time::sleep(self.config.delay_after(attempt)).await;
            }
        }

        let elapsed = self.started_at.elapsed();
        warn!(
            poll_id = %self.id,
            query = %self.query,
            attempts = max_attempts,
            elapsed_ms = elapsed.as_millis() as u64,
            "Poll timed out"
        );
        Err(PollError::Timeout {
            query: self.query,
            attempts: max_attempts,
            elapsed,
            last,
        })
    }
}

/// Poll `check` until `succeeded` or `failed` holds, or attempts run out.
pub async fn poll<S, E, F, Fut, P, Q>(
    query: impl Into<String>,
    config: &PollConfig,
    check: F,
    succeeded: P,
    failed: Q,
) -> Result<PollOutcome<S>, PollError<S>>
where
    S: fmt::Debug,
    E: Into<QueryError>,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<S, E>>,
    P: Fn(&S) -> bool,
    Q: Fn(&S) -> bool,
{
    PollTask::new(query, config.clone())
        .run(check, succeeded, failed)
        .await
}

/// Default delay between task status queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default number of task status queries.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default backoff cap.
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(60);
