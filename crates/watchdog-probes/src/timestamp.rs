//! Timestamp service probe.
//!
//! Requests a signed timestamp over a fixed payload and verifies it
//! with a [`TimestampService`] backend. Signature schemes are the
//! backend's business; this probe only maps its answers to issues.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use watchdog_core::Issue;

use crate::error::TimestampError;
use crate::probe::{Probe, ProbeCategory, ProbeOutcome, until_cancelled};

/// Payload stamped on every check.
pub const PROBE_PAYLOAD: [u8; 5] = [1, 2, 3, 4, 5];

/// Result of verifying a signed timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub valid: bool,
    /// The server URL the timestamp claims to come from.
    pub server_url: String,
}

/// Backend able to request and verify signed timestamps.
#[async_trait]
pub trait TimestampService: Send + Sync {
    type Timestamp: Send + Sync;

    async fn stamp(&self, server_url: &str, payload: &[u8]) -> Result<Self::Timestamp, TimestampError>;

    async fn verify(
        &self,
        timestamp: &Self::Timestamp,
        payload: &[u8],
    ) -> Result<Verification, TimestampError>;
}

/// Checks one timestamp server.
pub struct TimestampProbe<S> {
    url: String,
    service: Arc<S>,
}

impl<S: TimestampService> TimestampProbe<S> {
    pub fn new(url: impl Into<String>, service: Arc<S>) -> Self {
        Self {
            url: url.into(),
            service,
        }
    }

    async fn check(&self, cancel: &CancellationToken) -> ProbeOutcome {
        let url = &self.url;
        debug!(%url, "checking timestamp server");

        let stamped = until_cancelled(cancel, self.service.stamp(url, &PROBE_PAYLOAD)).await?;
        let timestamp = match stamped {
            Ok(timestamp) => timestamp,
            Err(e) => {
                return Ok(vec![Issue::danger(format!(
                    "{url}: requesting timestamp failed: {e}"
                ))]);
            }
        };

        let verified =
            until_cancelled(cancel, self.service.verify(&timestamp, &PROBE_PAYLOAD)).await?;
        let issue = match verified {
            Err(e) => Some(Issue::danger(format!("{url}: failed to verify signature: {e}"))),
            Ok(v) if !v.valid => Some(Issue::danger(format!("{url}: timestamp invalid"))),
            Ok(v) if v.server_url != *url => Some(Issue::warning(format!(
                "{url}: timestamp set for wrong url: {}",
                v.server_url
            ))),
            Ok(_) => None,
        };
        Ok(issue.into_iter().collect())
    }
}

#[async_trait]
impl<S: TimestampService + 'static> Probe for TimestampProbe<S> {
    fn category(&self) -> ProbeCategory {
        ProbeCategory::Timestamp
    }

    fn target(&self) -> &str {
        &self.url
    }

    async fn run(&self, cancel: &CancellationToken) -> ProbeOutcome {
        self.check(cancel).await
    }
}
