use std::time::Duration;

use super::{Notifier, NotifyOutcome};
use crate::error::MonitorError;

/// Posts `{"message": ...}` as JSON to a fixed URL. Any 2xx reply counts as delivered.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, MonitorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MonitorError::Notifier(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, message: &str) -> NotifyOutcome {
        let resp = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "message": message }))
            .send()
            .await;

        match resp {
            Ok(resp) if resp.status().is_success() => NotifyOutcome::Delivered,
            Ok(resp) => NotifyOutcome::Rejected {
                status: resp.status().as_u16(),
            },
            Err(e) if e.is_timeout() => NotifyOutcome::Failed("request timed out".into()),
            Err(e) => NotifyOutcome::Failed(e.to_string()),
        }
    }
}
