//! View types and formatting helpers for the status page.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use watchdog_core::{Issue, IssueList};
use watchdog_monitor::StatusReport;

/// One issue row.
pub struct IssueView {
    pub severity: &'static str,
    pub message: String,
}

impl From<&Issue> for IssueView {
    fn from(issue: &Issue) -> Self {
        Self {
            severity: issue.severity().label(),
            message: issue.message().to_string(),
        }
    }
}

/// Body of `GET /api/v1/issues`.
#[derive(Debug, Serialize)]
pub struct IssuesResponse {
    pub issues: IssueList,
    pub last_check: Option<DateTime<Utc>>,
    pub interval_secs: u64,
}

impl From<&StatusReport> for IssuesResponse {
    fn from(report: &StatusReport) -> Self {
        Self {
            issues: report.issues.clone(),
            last_check: report.checked_at,
            interval_secs: report.interval.as_secs(),
        }
    }
}

/// Milliseconds until the page reloads itself; never below one second.
pub fn reload_ms(interval: Duration) -> u64 {
    interval.as_millis().clamp(1_000, u64::MAX as u128) as u64
}

/// "3 minutes ago" style time, relative to `now`.
pub fn format_relative_time(then: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(then) = then else {
        return "never".to_string();
    };

    let delta = (now - then).num_seconds();
    if delta < 0 {
        return "just now".to_string();
    }

    let (n, unit) = match delta {
        0 => return "now".to_string(),
        1..60 => (delta, "second"),
        60..3_600 => (delta / 60, "minute"),
        3_600..86_400 => (delta / 3_600, "hour"),
        _ => (delta / 86_400, "day"),
    };
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn format_relative_time_values() {
        let now = Utc::now();
        let ago = |secs: i64| Some(now - TimeDelta::seconds(secs));

        assert_eq!(format_relative_time(None, now), "never");
        assert_eq!(format_relative_time(ago(0), now), "now");
        assert_eq!(format_relative_time(ago(1), now), "1 second ago");
        assert_eq!(format_relative_time(ago(30), now), "30 seconds ago");
        assert_eq!(format_relative_time(ago(180), now), "3 minutes ago");
        assert_eq!(format_relative_time(ago(3_600), now), "1 hour ago");
        assert_eq!(format_relative_time(ago(7_200), now), "2 hours ago");
        assert_eq!(format_relative_time(ago(172_800), now), "2 days ago");
        assert_eq!(format_relative_time(ago(-5), now), "just now");
    }

    #[test]
    fn reload_follows_interval() {
        assert_eq!(reload_ms(Duration::from_secs(300)), 300_000);
        assert_eq!(reload_ms(Duration::from_millis(10)), 1_000);
    }

    #[test]
    fn issue_view_carries_severity_label() {
        let view = IssueView::from(&Issue::danger("x"));
        assert_eq!(view.severity, "danger");
        assert_eq!(view.message, "x");
    }
}
