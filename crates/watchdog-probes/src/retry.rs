//! Retry budget and per-attempt bookkeeping for HTTP health checks.
//!
//! Each attempt is classified into an [`Attempt`]; the attempts are folded
//! into an [`AttemptHistory`] whose [`verdict`](AttemptHistory::verdict)
//! decides what the check reports once retrying stops.

use std::time::Duration;

use watchdog_core::{Issue, RetryConfig};

/// How often and how patiently a health check is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    max_retries: u32,
    min_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, min_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_retries,
            min_backoff,
            max_backoff: max_backoff.max(min_backoff),
        }
    }

    /// A single attempt with no retries.
    pub fn no_retries() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    /// Total attempts including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait before retry number `retry` (0-based): the minimum backoff
    /// doubled per retry, capped at the maximum.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.min_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self::new(config.max_retries, config.min_backoff, config.max_backoff)
    }
}

/// Classification of one request/response exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    Clean,
    Classified(Issue),
}

/// The sequence of attempts made for one health check, reduced to what
/// the final decision needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptHistory {
    attempts: u32,
    last_failure: Option<Issue>,
    last: Option<Attempt>,
}

impl AttemptHistory {
    /// Fold one more attempt into the history.
    pub fn record(mut self, attempt: Attempt) -> Self {
        self.attempts += 1;
        if let Attempt::Classified(issue) = &attempt {
            self.last_failure = Some(issue.clone());
        }
        self.last = Some(attempt);
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether another attempt is warranted: the latest one was not clean.
    pub fn wants_retry(&self) -> bool {
        matches!(self.last, Some(Attempt::Classified(_)))
    }

    /// The issue to report once retrying has stopped.
    ///
    /// - final attempt failed: that attempt's classification
    /// - final attempt clean after an earlier failure: an
    ///   "Unstable health check" warning carrying the latest failure
    /// - clean throughout (or nothing attempted): no issue
    pub fn verdict(self) -> Option<Issue> {
        match self.last {
            Some(Attempt::Classified(issue)) => Some(issue),
            Some(Attempt::Clean) => self.last_failure.map(|failure| {
                Issue::warning(format!("Unstable health check: {}", failure.message()))
            }),
            None => None,
        }
    }
}
