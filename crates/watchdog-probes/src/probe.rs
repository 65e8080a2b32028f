//! The `Probe` capability shared by every check kind.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use watchdog_core::Issue;

/// The check kinds a cycle runs, in snapshot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProbeCategory {
    SchemeManager,
    Certificate,
    Timestamp,
    HealthCheck,
}

impl ProbeCategory {
    /// Order in which category results are concatenated into a snapshot.
    pub const SNAPSHOT_ORDER: [ProbeCategory; 4] = [
        ProbeCategory::SchemeManager,
        ProbeCategory::Certificate,
        ProbeCategory::Timestamp,
        ProbeCategory::HealthCheck,
    ];

    /// HTTP health checks fan out as concurrent tasks; the other
    /// categories run one target after another on the cycle driver.
    pub fn runs_concurrently(&self) -> bool {
        matches!(self, ProbeCategory::HealthCheck)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProbeCategory::SchemeManager => "scheme-manager",
            ProbeCategory::Certificate => "certificate",
            ProbeCategory::Timestamp => "timestamp",
            ProbeCategory::HealthCheck => "health-check",
        }
    }
}

impl fmt::Display for ProbeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The probe was interrupted by cancellation before it could classify
/// its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("probe cancelled")]
pub struct Cancelled;

/// Issues found by one probe run, or an early cancellation.
pub type ProbeOutcome = Result<Vec<Issue>, Cancelled>;

/// One configured check against a target.
#[async_trait]
pub trait Probe: Send + Sync {
    fn category(&self) -> ProbeCategory;

    /// The URL or other identifier this probe checks, for logging.
    fn target(&self) -> &str;

    /// Run the check. Failures are reported as issues; only cancellation
    /// ends a run without a classification.
    async fn run(&self, cancel: &CancellationToken) -> ProbeOutcome;
}

/// Await `fut` unless `cancel` fires first.
pub(crate) async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, Cancelled> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Cancelled),
        output = fut => Ok(output),
    }
}
