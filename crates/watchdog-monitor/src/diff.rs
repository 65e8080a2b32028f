//! Issue-diff engine: which issues appeared and which were resolved
//! between two snapshots.
//!
//! Identity is the exact message text. Severity plays no part in
//! matching.

use std::collections::HashSet;

use watchdog_core::Issue;

/// Result of comparing two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Difference {
    /// In `current` but not in `previous`, in `current`'s order.
    pub appeared: Vec<Issue>,
    /// In `previous` but not in `current`, in `previous`'s order and
    /// carrying the previous severity. A message repeated in `previous`
    /// is reported once.
    pub resolved: Vec<Issue>,
}

impl Difference {
    pub fn is_empty(&self) -> bool {
        self.appeared.is_empty() && self.resolved.is_empty()
    }
}

/// Compare `previous` to `current` by message identity.
pub fn difference(previous: &[Issue], current: &[Issue]) -> Difference {
    let known: HashSet<&str> = previous.iter().map(Issue::message).collect();
    let mut still_present = HashSet::new();
    let mut appeared = Vec::new();

    for issue in current {
        if known.contains(issue.message()) {
            still_present.insert(issue.message());
        } else {
            appeared.push(issue.clone());
        }
    }

    let mut reported = HashSet::new();
    let resolved = previous
        .iter()
        .filter(|issue| !still_present.contains(issue.message()))
        .filter(|issue| reported.insert(issue.message()))
        .cloned()
        .collect();

    Difference { appeared, resolved }
}
