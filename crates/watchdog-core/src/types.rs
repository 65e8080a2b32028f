//! Issue model shared by every probe, the diff engine, and the
//! notification policy.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How serious a detected problem is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Advisory or unstable: configuration errors, flaky checks,
    /// certificates and keys expiring soon.
    Warning,
    /// Confirmed failure: unreachable endpoints, failed assertions,
    /// expired certificates, invalid signatures.
    Danger,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Danger => "danger",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A classified problem found by a probe.
///
/// Identity for diffing is the message text alone; severity is carried
/// along for presentation and notification routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    severity: Severity,
    message: String,
}

impl Issue {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self::new(Severity::Danger, message)
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

/// An ordered collection of issues, e.g. the snapshot of one check cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueList(Vec<Issue>);

impl IssueList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Messages of all issues with the given severity, in order.
    pub fn filter(&self, severity: Severity) -> Vec<String> {
        self.0
            .iter()
            .filter(|issue| issue.severity == severity)
            .map(|issue| issue.message.clone())
            .collect()
    }

    /// Messages of all issues, in order.
    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(|issue| issue.message.clone()).collect()
    }

    pub fn push(&mut self, issue: Issue) {
        self.0.push(issue);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Issue> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of issues with the given severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.0.iter().filter(|i| i.severity == severity).count()
    }

    pub fn as_slice(&self) -> &[Issue] {
        &self.0
    }
}

impl From<Vec<Issue>> for IssueList {
    fn from(issues: Vec<Issue>) -> Self {
        Self(issues)
    }
}

impl FromIterator<Issue> for IssueList {
    fn from_iter<I: IntoIterator<Item = Issue>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Issue> for IssueList {
    fn extend<I: IntoIterator<Item = Issue>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for IssueList {
    type Item = Issue;
    type IntoIter = std::vec::IntoIter<Issue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a IssueList {
    type Item = &'a Issue;
    type IntoIter = std::slice::Iter<'a, Issue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> IssueList {
        IssueList::from(vec![
            Issue::danger("a is down"),
            Issue::warning("b is flaky"),
            Issue::danger("c is down"),
        ])
    }

    #[test]
    fn filter_keeps_order_and_severity() {
        let issues = sample();
        assert_eq!(issues.filter(Severity::Danger), vec!["a is down", "c is down"]);
        assert_eq!(issues.filter(Severity::Warning), vec!["b is flaky"]);
    }

    #[test]
    fn filter_on_empty_list() {
        assert!(IssueList::new().filter(Severity::Danger).is_empty());
    }

    #[test]
    fn messages_projects_all() {
        assert_eq!(
            sample().messages(),
            vec!["a is down", "b is flaky", "c is down"]
        );
    }

    #[test]
    fn count_by_severity() {
        let issues = sample();
        assert_eq!(issues.count(Severity::Danger), 2);
        assert_eq!(issues.count(Severity::Warning), 1);
    }

    #[test]
    fn display_includes_severity() {
        assert_eq!(Issue::warning("x").to_string(), "[warning] x");
    }

    #[test]
    fn severity_serializes_lowercase() {
        let json = toml::to_string(&Issue::danger("boom")).unwrap();
        assert!(json.contains("severity = \"danger\""));
    }
}
