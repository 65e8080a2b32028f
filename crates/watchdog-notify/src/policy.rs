//! Notification policy.
//!
//! Rules, evaluated independently:
//!
//! - appeared issues on the first cycle since start: a neutral notice
//!   that results may repeat issues already known before the restart
//! - appeared `Danger` issues: one urgent notification with only those
//! - appeared `Warning` issues: one non-urgent notification with only those
//! - resolved issues: one notification listing all of them as fixed

use serde::Serialize;

use watchdog_core::{Issue, Severity};

pub const RESTART_NOTICE: &str =
    "I just (re)started. Results may repeat issues that were already known.";
pub const RESTART_FOUND: &str = "I just (re)started and found the following issues.";
pub const NEW_ISSUES: &str = "New issues discovered.";
pub const NEW_WARNINGS: &str = "New warnings discovered.";
pub const FIXED: &str = "The following issues were fixed.";

/// Attachment color as understood by Slack-compatible webhooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Danger,
    Warning,
    Good,
}

impl From<Severity> for Color {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Danger => Color::Danger,
            Severity::Warning => Color::Warning,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub text: String,
    pub color: Color,
}

/// One message to send to every configured channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub text: String,
    /// Broadcast to everyone in the channel.
    pub urgent: bool,
    pub attachments: Vec<Attachment>,
}

impl Notification {
    fn notice(text: &str) -> Self {
        Self {
            text: text.to_string(),
            urgent: false,
            attachments: Vec::new(),
        }
    }

    fn listing<'a>(
        text: &str,
        urgent: bool,
        color: Color,
        issues: impl IntoIterator<Item = &'a Issue>,
    ) -> Self {
        Self {
            text: text.to_string(),
            urgent,
            attachments: issues
                .into_iter()
                .map(|issue| Attachment {
                    text: issue.message().to_string(),
                    color,
                })
                .collect(),
        }
    }

    /// Messages carried as attachments, in order.
    pub fn messages(&self) -> Vec<&str> {
        self.attachments.iter().map(|a| a.text.as_str()).collect()
    }
}

/// Decide what to send for one cycle's diff.
pub fn plan(appeared: &[Issue], resolved: &[Issue], first_cycle: bool) -> Vec<Notification> {
    let mut out = Vec::new();

    if !appeared.is_empty() && first_cycle {
        out.push(Notification::notice(RESTART_NOTICE));
    }

    let of = |severity: Severity| appeared.iter().filter(move |i| i.severity() == severity);

    if of(Severity::Danger).next().is_some() {
        let text = if first_cycle { RESTART_FOUND } else { NEW_ISSUES };
        out.push(Notification::listing(
            text,
            true,
            Color::Danger,
            of(Severity::Danger),
        ));
    }
    if of(Severity::Warning).next().is_some() {
        out.push(Notification::listing(
            NEW_WARNINGS,
            false,
            Color::Warning,
            of(Severity::Warning),
        ));
    }
    if !resolved.is_empty() {
        out.push(Notification::listing(FIXED, false, Color::Good, resolved));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn danger_and_warning_are_sent_separately() {
        let appeared = [Issue::danger("X"), Issue::warning("Y")];
        let sent = plan(&appeared, &[], false);

        assert_eq!(sent.len(), 2);
        assert!(sent[0].urgent);
        assert_eq!(sent[0].text, NEW_ISSUES);
        assert_eq!(sent[0].messages(), vec!["X"]);
        assert_eq!(sent[0].attachments[0].color, Color::Danger);

        assert!(!sent[1].urgent);
        assert_eq!(sent[1].text, NEW_WARNINGS);
        assert_eq!(sent[1].messages(), vec!["Y"]);
        assert_eq!(sent[1].attachments[0].color, Color::Warning);
    }

    #[test]
    fn first_cycle_adds_restart_notice() {
        let appeared = [Issue::danger("X"), Issue::danger("Z")];
        let sent = plan(&appeared, &[], true);

        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].text, RESTART_NOTICE);
        assert!(sent[0].attachments.is_empty());
        assert!(!sent[0].urgent);
        assert_eq!(sent[1].text, RESTART_FOUND);
        assert_eq!(sent[1].messages(), vec!["X", "Z"]);
    }

    #[test]
    fn quiet_first_cycle_sends_nothing() {
        assert!(plan(&[], &[], true).is_empty());
    }

    #[test]
    fn resolved_are_listed_as_fixed_regardless_of_severity() {
        let resolved = [Issue::danger("A"), Issue::warning("B")];
        let sent = plan(&[], &resolved, false);

        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, FIXED);
        assert!(!sent[0].urgent);
        assert_eq!(sent[0].messages(), vec!["A", "B"]);
        assert!(sent[0].attachments.iter().all(|a| a.color == Color::Good));
    }

    #[test]
    fn all_rules_fire_together() {
        let appeared = [Issue::warning("W"), Issue::danger("D")];
        let resolved = [Issue::danger("R")];
        let texts: Vec<_> = plan(&appeared, &resolved, true)
            .into_iter()
            .map(|n| n.text)
            .collect();
        assert_eq!(texts, vec![RESTART_NOTICE, RESTART_FOUND, NEW_WARNINGS, FIXED]);
    }
}
