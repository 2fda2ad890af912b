//! Webhook delivery for Discord and Apprise.

use std::time::Duration;

use arrsync_config::{NotificationConfig, NotificationService};
use arrsync_core::{Notifier, Severity, SyncError, SyncResult};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use url::Url;

use crate::error::{ClientError, ClientResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const EMBED_TITLE: &str = "Rsync Seedbox";
const COLOR_ERROR: u32 = 0x00FF_0000;
const COLOR_MESSAGE: u32 = 0x0000_FF00;

/// Posts run summaries to a Discord webhook or an Apprise endpoint.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    service: NotificationService,
    url: Url,
    apprise_tag: String,
}

impl WebhookNotifier {
    /// Build a notifier with the standard request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(config: &NotificationConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| ClientError::ClientBuild { source })?;
        Ok(Self {
            client,
            service: config.service,
            url: config.url.clone(),
            apprise_tag: config.apprise_tag.clone(),
        })
    }

    /// JSON body for `message`.
    #[must_use]
    pub fn payload(&self, message: &str, severity: Severity) -> Value {
        match self.service {
            NotificationService::Discord => {
                let color = match severity {
                    Severity::Error => COLOR_ERROR,
                    Severity::Message => COLOR_MESSAGE,
                };
                json!({
                    "embeds": [{
                        "title": EMBED_TITLE,
                        "description": message,
                        "color": color,
                    }]
                })
            }
            NotificationService::Apprise => json!({
                "body": message,
                "tags": self.apprise_tag,
            }),
        }
    }

    /// Post `message`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status.
    pub async fn send(&self, message: &str, severity: Severity) -> ClientResult<()> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&self.payload(message, severity))
            .send()
            .await
            .map_err(|source| ClientError::Http {
                operation: "webhook.send",
                source,
            })?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ClientError::HttpStatus {
                operation: "webhook.send",
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, message: &str, severity: Severity) -> SyncResult<()> {
        self.send(message, severity)
            .await
            .map_err(|err| SyncError::notification("webhook.notify", err))
    }
}
