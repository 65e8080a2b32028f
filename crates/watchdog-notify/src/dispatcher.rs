//! Fire-and-forget fan-out of notifications to every channel.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, warn};

use crate::error::NotifyResult;
use crate::policy::Notification;

/// A delivery channel for notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Identifies the channel in logs.
    fn name(&self) -> &str;

    async fn send(&self, notification: &Notification) -> NotifyResult<()>;
}

/// Sends notifications to all sinks on detached tasks, one per sink.
#[derive(Clone, Default)]
pub struct Dispatcher {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl Dispatcher {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }

    /// Spawn delivery of `notifications` and return immediately.
    ///
    /// Every notification is attempted on every sink, in order per sink;
    /// a slow sink does not hold up the others. Failures are logged and
    /// never retried. The handle resolves once every sink is done and is
    /// only useful to tests; callers normally drop it.
    pub fn dispatch(&self, notifications: Vec<Notification>) -> Option<JoinHandle<()>> {
        if notifications.is_empty() || self.sinks.is_empty() {
            return None;
        }
        let notifications = Arc::new(notifications);
        let mut deliveries = JoinSet::new();
        for sink in &self.sinks {
            let sink = sink.clone();
            let notifications = notifications.clone();
            deliveries.spawn(async move { deliver(sink.as_ref(), &notifications).await });
        }
        Some(tokio::spawn(async move {
            while let Some(joined) = deliveries.join_next().await {
                if let Err(e) = joined {
                    error!(error = %e, "notification task failed");
                }
            }
        }))
    }
}

async fn deliver(sink: &dyn NotificationSink, notifications: &[Notification]) {
    for notification in notifications {
        match sink.send(notification).await {
            Ok(()) => debug!(sink = sink.name(), text = %notification.text, "notification sent"),
            Err(e) => warn!(sink = sink.name(), error = %e, "notification delivery failed"),
        }
    }
}
