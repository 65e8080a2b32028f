//! Single-writer status board.
//!
//! The scheduler publishes each completed snapshot by replacing the
//! shared `Arc<StatusReport>`; readers only ever see whole reports.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use watchdog_core::IssueList;

/// The outcome of the most recent completed check cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub issues: IssueList,
    /// `None` until the first cycle completes.
    pub checked_at: Option<DateTime<Utc>>,
    /// Configured time between cycles.
    pub interval: Duration,
}

/// Write side, owned by the scheduler.
#[derive(Debug)]
pub struct StatusBoard {
    tx: watch::Sender<Arc<StatusReport>>,
}

impl StatusBoard {
    pub fn new(interval: Duration) -> Self {
        let (tx, _) = watch::channel(Arc::new(StatusReport {
            issues: IssueList::new(),
            checked_at: None,
            interval,
        }));
        Self { tx }
    }

    pub fn reader(&self) -> StatusReader {
        StatusReader {
            rx: self.tx.subscribe(),
        }
    }

    /// Replace the published report.
    pub fn publish(&self, issues: IssueList, checked_at: DateTime<Utc>) {
        let interval = self.tx.borrow().interval;
        self.tx.send_replace(Arc::new(StatusReport {
            issues,
            checked_at: Some(checked_at),
            interval,
        }));
    }

    pub fn current(&self) -> Arc<StatusReport> {
        self.tx.borrow().clone()
    }
}

/// Read side, cloned into every consumer.
#[derive(Debug, Clone)]
pub struct StatusReader {
    rx: watch::Receiver<Arc<StatusReport>>,
}

impl StatusReader {
    pub fn current(&self) -> Arc<StatusReport> {
        self.rx.borrow().clone()
    }

    /// Wait for the next publish. Returns `false` once the board is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchdog_core::Issue;

    #[test]
    fn starts_empty_and_unchecked() {
        let board = StatusBoard::new(Duration::from_secs(300));
        let report = board.reader().current();
        assert!(report.issues.is_empty());
        assert_eq!(report.checked_at, None);
        assert_eq!(report.interval, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn readers_see_whole_reports() {
        let board = StatusBoard::new(Duration::from_secs(60));
        let mut reader = board.reader();
        let before = reader.current();

        let now = Utc::now();
        board.publish(IssueList::from(vec![Issue::danger("x")]), now);

        assert!(reader.changed().await);
        let after = reader.current();
        assert_eq!(after.issues.messages(), vec!["x"]);
        assert_eq!(after.checked_at, Some(now));
        assert_eq!(after.interval, Duration::from_secs(60));
        // The earlier handle is untouched.
        assert!(before.issues.is_empty());
    }

    #[test]
    fn publish_without_readers_still_updates() {
        let board = StatusBoard::new(Duration::from_secs(1));
        board.publish(IssueList::from(vec![Issue::warning("w")]), Utc::now());
        assert_eq!(board.current().issues.len(), 1);
    }
}
