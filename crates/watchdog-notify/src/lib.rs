//! watchdog-notify — decides what operators are told after each cycle,
//! and delivers it.
//!
//! The [`policy`] turns an appeared/resolved diff into a list of
//! [`Notification`]s. The [`Dispatcher`] hands them to every configured
//! [`NotificationSink`] on a detached task: delivery is at-most-once,
//! without retries, and a failing channel never blocks the others or
//! the next check cycle.

pub mod dispatcher;
pub mod error;
pub mod policy;
pub mod slack;

pub use dispatcher::{Dispatcher, NotificationSink};
pub use error::{NotifyError, NotifyResult};
pub use policy::{Attachment, Color, Notification, plan};
pub use slack::SlackWebhook;
