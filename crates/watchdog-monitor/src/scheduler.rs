//! Check scheduler — runs every probe once per cycle, diffs the new
//! snapshot against the previous one, notifies, and publishes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::Client;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use watchdog_core::{Issue, IssueList, WatchdogConfig};
use watchdog_notify::{Dispatcher, Notification, NotificationSink, SlackWebhook, plan};
use watchdog_probes::{
    Cancelled, CertificateProbe, HealthCheckProbe, HttpSchemeSource, Probe, ProbeCategory,
    ProbeOutcome, RetryPolicy, SchemeProbe,
};

use crate::diff::difference;
use crate::error::MonitorResult;
use crate::state::{StatusBoard, StatusReader};

/// State carried from one completed cycle to the next.
#[derive(Debug, Clone)]
pub struct CycleState {
    pub previous: IssueList,
    pub first: bool,
}

impl Default for CycleState {
    fn default() -> Self {
        Self {
            previous: IssueList::new(),
            first: true,
        }
    }
}

/// Drives the fixed-interval check cycle.
pub struct CheckScheduler {
    probes: Vec<Arc<dyn Probe>>,
    /// Reported every cycle for targets no probe can check.
    unchecked: Vec<Issue>,
    interval: Duration,
    stagger: Duration,
    board: StatusBoard,
    dispatcher: Dispatcher,
}

impl CheckScheduler {
    /// A scheduler with no probes and no notification channels.
    pub fn new(interval: Duration, stagger: Duration) -> Self {
        Self {
            probes: Vec::new(),
            unchecked: Vec::new(),
            interval,
            stagger,
            board: StatusBoard::new(interval),
            dispatcher: Dispatcher::default(),
        }
    }

    /// Build every configured probe and notification channel.
    ///
    /// Timestamp servers need a verification backend registered through
    /// [`with_probe`](Self::with_probe); configured ones are not probed
    /// here and show up as a warning in every snapshot instead.
    pub fn from_config(config: &WatchdogConfig) -> MonitorResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("watchdogd/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let policy = RetryPolicy::from(config.retry);

        let mut scheduler = Self::new(config.interval, config.stagger);

        for (url, pinned_key) in &config.check_scheme_managers {
            scheduler = scheduler.with_probe(Arc::new(SchemeProbe::new(HttpSchemeSource::new(
                url,
                pinned_key,
                client.clone(),
            ))));
        }
        for url in &config.check_certificate_expiry {
            scheduler =
                scheduler.with_probe(Arc::new(CertificateProbe::new(url, config.request_timeout)));
        }
        for url in &config.check_timestamp_servers {
            warn!(%url, "no timestamp verification backend available; target will not be checked");
            scheduler
                .unchecked
                .push(Issue::warning(format!("{url}: no timestamp verification backend")));
        }
        for spec in &config.health_checks {
            scheduler = scheduler.with_probe(Arc::new(HealthCheckProbe::with_client(
                spec.clone(),
                policy,
                client.clone(),
            )));
        }

        let sinks = config
            .slack_webhooks
            .iter()
            .map(|url| Arc::new(SlackWebhook::new(url, client.clone())) as Arc<dyn NotificationSink>)
            .collect();
        Ok(scheduler.with_dispatcher(Dispatcher::new(sinks)))
    }

    pub fn with_probe(mut self, probe: Arc<dyn Probe>) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn probes(&self) -> &[Arc<dyn Probe>] {
        &self.probes
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Read handle on the published status.
    pub fn reader(&self) -> StatusReader {
        self.board.reader()
    }

    /// Run cycles until `cancel` fires. The first cycle starts
    /// immediately; each later one starts `interval` after the previous
    /// one completed.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            probes = self.probes.len(),
            interval_secs = self.interval.as_secs(),
            "check scheduler started"
        );

        let mut state = CycleState::default();
        loop {
            let started = Instant::now();
            match self.run_cycle(&cancel).await {
                Some(current) => {
                    self.complete_cycle(&mut state, current, started.elapsed());
                }
                None => {
                    info!("check cycle cancelled; partial results discarded");
                    break;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = cancel.cancelled() => break,
            }
        }

        info!("check scheduler shutting down");
    }

    /// Run every probe once and assemble the snapshot, or `None` when
    /// cancelled before all probes finished.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Option<IssueList> {
        debug!(probes = self.probes.len(), "running checks");

        let mut launched: Vec<JoinHandle<ProbeOutcome>> = Vec::new();
        for (i, probe) in self
            .probes
            .iter()
            .filter(|p| p.category().runs_concurrently())
            .enumerate()
        {
            if i > 0 && !self.stagger.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.stagger) => {}
                    _ = cancel.cancelled() => {
                        abort_all(&launched);
                        return None;
                    }
                }
            }
            let probe = probe.clone();
            let cancel = cancel.clone();
            launched.push(tokio::spawn(async move { probe.run(&cancel).await }));
        }

        let mut by_category: BTreeMap<ProbeCategory, Vec<Issue>> = BTreeMap::new();

        let mut sequential: Vec<&Arc<dyn Probe>> = self
            .probes
            .iter()
            .filter(|p| !p.category().runs_concurrently())
            .collect();
        sequential.sort_by_key(|p| p.category());
        for probe in sequential {
            match probe.run(cancel).await {
                Ok(issues) => by_category.entry(probe.category()).or_default().extend(issues),
                Err(Cancelled) => {
                    info!(probe = probe.target(), category = %probe.category(), "probe cancelled");
                    abort_all(&launched);
                    return None;
                }
            }
        }

        if !self.unchecked.is_empty() {
            by_category
                .entry(ProbeCategory::Timestamp)
                .or_default()
                .extend(self.unchecked.iter().cloned());
        }

        let mut handles = launched.into_iter();
        while let Some(handle) = handles.next() {
            match handle.await {
                Ok(Ok(issues)) => by_category
                    .entry(ProbeCategory::HealthCheck)
                    .or_default()
                    .extend(issues),
                Ok(Err(Cancelled)) => {
                    info!("health check cancelled");
                    for rest in handles {
                        rest.abort();
                    }
                    return None;
                }
                Err(e) => error!(error = %e, "health check task failed"),
            }
        }

        let snapshot = ProbeCategory::SNAPSHOT_ORDER
            .iter()
            .filter_map(|category| by_category.remove(category))
            .flatten()
            .collect();
        Some(snapshot)
    }

    /// Diff `current` against the previous snapshot, send notifications,
    /// and publish. Returns what was handed to the dispatcher.
    pub fn complete_cycle(
        &self,
        state: &mut CycleState,
        current: IssueList,
        elapsed: Duration,
    ) -> Vec<Notification> {
        let diff = difference(state.previous.as_slice(), current.as_slice());
        let notifications = plan(&diff.appeared, &diff.resolved, state.first);

        info!(
            issues = current.len(),
            appeared = diff.appeared.len(),
            resolved = diff.resolved.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "check cycle complete"
        );

        // Dropping the handle detaches delivery from the cycle.
        drop(self.dispatcher.dispatch(notifications.clone()));

        self.board.publish(current.clone(), Utc::now());
        state.previous = current;
        state.first = false;
        notifications
    }
}

fn abort_all(handles: &[JoinHandle<ProbeOutcome>]) {
    for handle in handles {
        handle.abort();
    }
}
