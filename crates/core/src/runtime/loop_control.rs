use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What the loop does after a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome<T> {
    /// Sleep one interval and poll again.
    Continue,
    /// Leave the loop for good.
    Stop(T),
}

/// Sleep for `interval` unless cancelled first.
/// Returns `true` when the full interval elapsed, `false` on cancellation.
pub async fn wait_next_cycle(token: &CancellationToken, interval: Duration) -> bool {
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(interval) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn waits_full_interval() {
        let token = CancellationToken::new();
        let started = Instant::now();
        assert!(wait_next_cycle(&token, Duration::from_millis(20)).await);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn cancellation_cuts_wait_short() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });
        let started = Instant::now();
        assert!(!wait_next_cycle(&token, Duration::from_secs(60)).await);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn already_cancelled_returns_immediately() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(!wait_next_cycle(&token, Duration::from_secs(60)).await);
    }
}
