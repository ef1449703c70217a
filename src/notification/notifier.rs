//! Push notification delivery.

use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;
use serde::Serialize;

use crate::Error;

/// A push notification about the user's spending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendNotification {
    /// The device token to deliver to.
    pub token: String,
    /// The notification title.
    pub title: String,
    /// The notification text.
    pub body: String,
    /// The percentage of the budget used, included for clients that render their own message.
    pub usage_rate: i64,
}

/// Something that can deliver push notifications to a user's device.
#[async_trait]
pub trait Notifier: Debug + Send + Sync {
    /// Deliver `notification`.
    ///
    /// # Errors
    /// Returns [Error::NotificationError] if the notification could not be delivered.
    async fn send_spend_notification(&self, notification: &SpendNotification)
    -> Result<(), Error>;
}

#[derive(Serialize)]
struct PushMessage<'a> {
    to: &'a str,
    notification: PushContent<'a>,
    data: PushData,
}

#[derive(Serialize)]
struct PushContent<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Serialize)]
struct PushData {
    usage_rate: String,
}

/// Sends notifications to an FCM style HTTP endpoint authenticated with a server key.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: reqwest::Client,
    url: String,
    server_key: String,
}

impl HttpNotifier {
    /// Create a notifier that posts to `url` with the `server_key`.
    pub fn new(url: impl Into<String>, server_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            server_key: server_key.into(),
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send_spend_notification(
        &self,
        notification: &SpendNotification,
    ) -> Result<(), Error> {
        let message = PushMessage {
            to: &notification.token,
            notification: PushContent {
                title: &notification.title,
                body: &notification.body,
            },
            data: PushData {
                usage_rate: notification.usage_rate.to_string(),
            },
        };

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("key={}", self.server_key))
            .timeout(Duration::from_secs(10))
            .json(&message)
            .send()
            .await
            .map_err(|error| Error::NotificationError(error.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::NotificationError(format!(
                "push endpoint returned {}",
                response.status()
            )));
        }

        tracing::debug!("Sent push notification \"{}\"", notification.title);

        Ok(())
    }
}

/// Writes notifications to the log instead of sending them.
///
/// Used when no push server key is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_spend_notification(
        &self,
        notification: &SpendNotification,
    ) -> Result<(), Error> {
        tracing::info!(
            "Push notification (not sent): {} - {}",
            notification.title,
            notification.body
        );

        Ok(())
    }
}
