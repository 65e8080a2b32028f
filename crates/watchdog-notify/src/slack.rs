//! Slack-compatible incoming webhook delivery.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::dispatcher::NotificationSink;
use crate::error::{NotifyError, NotifyResult};
use crate::policy::{Color, Notification};

const USERNAME: &str = "watchdogd";
const ICON_EMOJI: &str = ":dog:";
const BROADCAST: &str = "<!channel> ";

#[derive(Debug, Serialize)]
struct Payload<'a> {
    text: String,
    username: &'a str,
    icon_emoji: &'a str,
    attachments: Vec<PayloadAttachment<'a>>,
}

#[derive(Debug, Serialize)]
struct PayloadAttachment<'a> {
    fallback: &'a str,
    text: &'a str,
    color: Color,
}

impl<'a> Payload<'a> {
    fn from_notification(notification: &'a Notification) -> Self {
        let text = if notification.urgent {
            format!("{BROADCAST}{}", notification.text)
        } else {
            notification.text.clone()
        };
        Self {
            text,
            username: USERNAME,
            icon_emoji: ICON_EMOJI,
            attachments: notification
                .attachments
                .iter()
                .map(|a| PayloadAttachment {
                    fallback: &a.text,
                    text: &a.text,
                    color: a.color,
                })
                .collect(),
        }
    }
}

/// Posts notifications to one webhook URL.
pub struct SlackWebhook {
    url: String,
    client: Client,
}

impl SlackWebhook {
    pub fn new(url: impl Into<String>, client: Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl NotificationSink for SlackWebhook {
    fn name(&self) -> &str {
        &self.url
    }

    async fn send(&self, notification: &Notification) -> NotifyResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&Payload::from_notification(notification))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}
