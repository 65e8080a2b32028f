//! HTTP health check probe logic.
//!
//! Sends the configured request, classifies each response against the
//! configured assertions, and retries non-clean attempts with
//! exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Request, Url};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use watchdog_core::{HealthCheckSpec, Issue};

use crate::probe::{Cancelled, Probe, ProbeCategory, ProbeOutcome, until_cancelled};
use crate::retry::{Attempt, AttemptHistory, RetryPolicy};

/// One configured HTTP health check with its retry budget.
#[derive(Debug)]
pub struct HealthCheckProbe {
    spec: HealthCheckSpec,
    policy: RetryPolicy,
    /// Client construction can fail (e.g. TLS backend setup); the error
    /// is reported when the check runs.
    client: Result<Client, String>,
}

impl HealthCheckProbe {
    /// Create a probe with its own client using `timeout` per request.
    pub fn new(spec: HealthCheckSpec, policy: RetryPolicy, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("watchdogd/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| e.to_string());
        Self::with_client_result(spec, policy, client)
    }

    /// Create a probe sharing an existing client.
    pub fn with_client(spec: HealthCheckSpec, policy: RetryPolicy, client: Client) -> Self {
        Self::with_client_result(spec, policy, Ok(client))
    }

    fn with_client_result(
        spec: HealthCheckSpec,
        policy: RetryPolicy,
        client: Result<Client, String>,
    ) -> Self {
        Self {
            spec,
            policy,
            client,
        }
    }

    /// Run the check: at most one issue, or `Cancelled`.
    pub async fn check(&self, cancel: &CancellationToken) -> Result<Option<Issue>, Cancelled> {
        let url = &self.spec.request_url;
        debug!(%url, method = self.spec.method(), "checking HTTP endpoint");

        let client = match &self.client {
            Ok(client) => client,
            Err(e) => {
                return Ok(Some(Issue::danger(format!(
                    "Health check failed unexpectedly: {e}"
                ))));
            }
        };
        // A malformed check is a configuration problem, not an outage.
        if let Err(e) = self.build_request(client) {
            warn!(%url, error = %e, "invalid health check");
            return Ok(Some(Issue::warning(format!("{url}: invalid health check"))));
        }

        let mut history = AttemptHistory::default();
        for attempt in 0..self.policy.max_attempts() {
            if attempt > 0 {
                let wait = self.policy.backoff(attempt - 1);
                until_cancelled(cancel, tokio::time::sleep(wait)).await?;
            }

            let outcome = until_cancelled(cancel, self.attempt(client)).await?;
            if let Attempt::Classified(issue) = &outcome {
                warn!(
                    %url,
                    attempt = attempt + 1,
                    max_attempts = self.policy.max_attempts(),
                    issue = issue.message(),
                    "health check attempt failed"
                );
            }

            history = history.record(outcome);
            if !history.wants_retry() {
                break;
            }
        }

        let verdict = history.verdict();
        if let Some(issue) = &verdict {
            info!(%url, severity = %issue.severity(), "health check reported an issue");
        }
        Ok(verdict)
    }

    /// One request/response exchange, classified.
    async fn attempt(&self, client: &Client) -> Attempt {
        let url = &self.spec.request_url;
        let request = match self.build_request(client) {
            Ok(request) => request,
            Err(_) => return Attempt::Classified(Issue::warning(format!("{url}: invalid health check"))),
        };

        let response = match client.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                debug!(%url, error = %e, "health check request failed");
                return Attempt::Classified(Issue::danger(format!("{url}: cannot be reached")));
            }
        };

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        match response.bytes().await {
            Ok(body) => classify_response(&self.spec, status, &headers, &body),
            Err(e) => {
                debug!(%url, error = %e, "health check body read failed");
                Attempt::Classified(Issue::danger(format!(
                    "{url}: response body could not be read"
                )))
            }
        }
    }

    fn build_request(&self, client: &Client) -> Result<Request, String> {
        let method = Method::from_bytes(self.spec.method().as_bytes()).map_err(|e| e.to_string())?;
        let url = Url::parse(&self.spec.request_url).map_err(|e| e.to_string())?;

        let mut headers = HeaderMap::new();
        for (key, value) in &self.spec.request_headers {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| e.to_string())?;
            let value = HeaderValue::from_str(value).map_err(|e| e.to_string())?;
            headers.insert(name, value);
        }

        client
            .request(method, url)
            .headers(headers)
            .body(self.spec.request_body.clone())
            .build()
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl Probe for HealthCheckProbe {
    fn category(&self) -> ProbeCategory {
        ProbeCategory::HealthCheck
    }

    fn target(&self) -> &str {
        &self.spec.request_url
    }

    async fn run(&self, cancel: &CancellationToken) -> ProbeOutcome {
        Ok(self.check(cancel).await?.into_iter().collect())
    }
}

/// Check a received response against the configured assertions.
///
/// Only the first violation is reported: status code, then each expected
/// header in key order, then the body substring.
pub fn classify_response(
    spec: &HealthCheckSpec,
    status: u16,
    headers: &HeaderMap,
    body: &[u8],
) -> Attempt {
    let url = &spec.request_url;

    if status != spec.expected_status() {
        return Attempt::Classified(Issue::danger(format!(
            "{url}: received unexpected status code {status}"
        )));
    }

    for (key, value) in &spec.response_header_contains {
        let actual = headers
            .get(key.as_str())
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if actual != value {
            return Attempt::Classified(Issue::danger(format!(
                "{url}: expected response header \"{key}: {value}\" could not be found"
            )));
        }
    }

    if !String::from_utf8_lossy(body).contains(spec.response_body_contains.as_str()) {
        return Attempt::Classified(Issue::danger(format!(
            "{url}: expected response body \"{}\" could not be found",
            spec.response_body_contains
        )));
    }

    Attempt::Clean
}
