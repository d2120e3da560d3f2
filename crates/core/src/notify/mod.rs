use std::sync::{Arc, Mutex};

mod webhook;

pub use webhook::WebhookNotifier;

/// Result of one delivery attempt. Never escalated; the caller logs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Delivered,
    /// Endpoint answered with a non-success status.
    Rejected { status: u16 },
    /// Transport error or timeout.
    Failed(String),
}

impl NotifyOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Best-effort, at-most-once message sink.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> NotifyOutcome;
}

/// Mock notifier for testing. Records every message and returns a fixed outcome.
#[derive(Debug, Clone)]
pub struct MockNotifier {
    sent: Arc<Mutex<Vec<String>>>,
    outcome: NotifyOutcome,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::with_outcome(NotifyOutcome::Delivered)
    }

    pub fn with_outcome(outcome: NotifyOutcome) -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            outcome,
        }
    }

    /// Messages received so far, in call order.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, message: &str) -> NotifyOutcome {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.to_owned());
        }
        self.outcome.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_records_in_order() {
        let mock = MockNotifier::new();
        let shared = mock.clone();
        assert!(mock.send("first").await.is_delivered());
        mock.send("second").await;
        assert_eq!(shared.sent(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn mock_returns_configured_outcome() {
        let mock = MockNotifier::with_outcome(NotifyOutcome::Rejected { status: 503 });
        assert_eq!(mock.send("x").await, NotifyOutcome::Rejected { status: 503 });
        assert_eq!(mock.sent().len(), 1);
    }
}
