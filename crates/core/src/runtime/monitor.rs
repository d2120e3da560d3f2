use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use upsmon_nut::{NutError, UpsClient};

use super::loop_control::{self, CycleOutcome};
use super::shutdown::ShutdownGuard;
use crate::config::MonitorCfg;
use crate::error::MonitorError;
use crate::halt::ShutdownTrigger;
use crate::notify::{Notifier, NotifyOutcome};
use crate::policy::{self, Policy, SHUTDOWN_ANNOUNCEMENT};
use crate::status::{self, StatusSnapshot};

/// State held for the lifetime of the daemon. Only the loop mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorState {
    target_ups_name: String,
    shutdown_initiated: bool,
}

impl MonitorState {
    pub fn new(target_ups_name: impl Into<String>) -> Self {
        Self {
            target_ups_name: target_ups_name.into(),
            shutdown_initiated: false,
        }
    }

    pub fn target_ups_name(&self) -> &str {
        &self.target_ups_name
    }

    /// Set once the shutdown path has fired; never reset.
    pub fn shutdown_initiated(&self) -> bool {
        self.shutdown_initiated
    }
}

/// Why the polling loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorExit {
    /// The configured UPS is not known to the service. Not retried.
    UnknownUps { available: Vec<String> },
    /// Low battery: the host halt was requested (successfully or not).
    ShutdownInitiated,
    /// A termination signal arrived.
    Cancelled,
}

/// The polling loop and decision engine.
///
/// Strictly sequential: fetch, decode, evaluate, notify, then wait one
/// interval. Query failures are logged and retried on the next cycle with
/// no cap and no backoff.
pub struct Monitor {
    cfg: Arc<MonitorCfg>,
    policy: Policy,
    state: MonitorState,
    /// upsd connection, held for the whole run.
    client: Box<dyn UpsClient>,
    notifier: Arc<dyn Notifier>,
    halt: Arc<dyn ShutdownTrigger>,
    shutdown: ShutdownGuard,
    cycle_count: u64,
}

impl Monitor {
    pub fn new(
        cfg: Arc<MonitorCfg>,
        client: Box<dyn UpsClient>,
        notifier: Arc<dyn Notifier>,
        halt: Arc<dyn ShutdownTrigger>,
    ) -> Self {
        Self {
            policy: Policy::from_cfg(&cfg),
            state: MonitorState::new(cfg.ups_name.clone()),
            cfg,
            client,
            notifier,
            halt,
            shutdown: ShutdownGuard::new(),
            cycle_count: 0,
        }
    }

    /// Token that ends the loop at its next wait when cancelled.
    pub fn token(&self) -> CancellationToken {
        self.shutdown.token()
    }

    pub fn shutdown_guard(&self) -> &ShutdownGuard {
        &self.shutdown
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// Poll until the UPS is unknown, the shutdown path fires, or the token is cancelled.
    pub async fn run(&mut self) -> MonitorExit {
        if self.state.shutdown_initiated {
            tracing::warn!("shutdown already initiated, not polling again");
            return MonitorExit::ShutdownInitiated;
        }

        let token = self.shutdown.token();
        let interval = self.cfg.check_interval();
        tracing::info!(
            ups = %self.state.target_ups_name,
            interval_secs = interval.as_secs(),
            threshold = self.policy.low_battery_threshold,
            "monitor loop started"
        );

        loop {
            if token.is_cancelled() {
                return MonitorExit::Cancelled;
            }
            if let CycleOutcome::Stop(exit) = self.run_cycle().await {
                return exit;
            }
            if !loop_control::wait_next_cycle(&token, interval).await {
                tracing::info!("monitor loop cancelled");
                return MonitorExit::Cancelled;
            }
        }
    }

    /// One fetch/decode/evaluate pass.
    pub async fn run_cycle(&mut self) -> CycleOutcome<MonitorExit> {
        self.cycle_count += 1;
        tracing::debug!(cycle = self.cycle_count, "polling UPS service");

        let listed = tokio::time::timeout(self.cfg.query_timeout(), self.client.list_ups())
            .await
            .unwrap_or(Err(NutError::Timeout));
        let units = match listed {
            Ok(units) => units,
            Err(e) => {
                tracing::error!(error = %e, "error querying UPS service");
                return CycleOutcome::Continue;
            }
        };

        if !units.iter().any(|u| *u == self.state.target_ups_name) {
            let err = MonitorError::UnknownUps {
                name: self.state.target_ups_name.clone(),
                available: units.clone(),
            };
            tracing::error!("{err}");
            return CycleOutcome::Stop(MonitorExit::UnknownUps { available: units });
        }

        let snapshot = self.fetch_snapshot().await;
        log_snapshot(&snapshot);

        let eval = policy::evaluate(&snapshot, &self.policy);
        for notice in &eval.notices {
            self.notify(&notice.message()).await;
        }
        if eval.shutdown {
            self.shutdown_path().await;
            return CycleOutcome::Stop(MonitorExit::ShutdownInitiated);
        }

        CycleOutcome::Continue
    }

    /// Variables for the target UPS. A failed fetch degrades to an
    /// `Unavailable` snapshot rather than dropping the cycle.
    async fn fetch_snapshot(&mut self) -> StatusSnapshot {
        let fetch = self.client.list_vars(&self.state.target_ups_name);
        let fetched = tokio::time::timeout(self.cfg.query_timeout(), fetch)
            .await
            .unwrap_or(Err(NutError::Timeout));
        match fetched {
            Ok(vars) => status::decode(&vars),
            Err(e) => {
                tracing::error!(error = %e, "error fetching UPS variables");
                StatusSnapshot::unavailable()
            }
        }
    }

    /// Send one message; the outcome is logged and otherwise ignored.
    async fn notify(&self, message: &str) {
        let outcome = tokio::time::timeout(self.cfg.notify_timeout(), self.notifier.send(message))
            .await
            .unwrap_or_else(|_| NotifyOutcome::Failed("notification timed out".into()));
        match outcome {
            NotifyOutcome::Delivered => tracing::info!("notification sent"),
            NotifyOutcome::Rejected { status } => {
                tracing::error!(status, "notification rejected by endpoint")
            }
            NotifyOutcome::Failed(reason) => {
                tracing::error!(error = %reason, "notification failed")
            }
        }
    }

    async fn shutdown_path(&mut self) {
        self.state.shutdown_initiated = true;
        self.notify(SHUTDOWN_ANNOUNCEMENT).await;
        tracing::info!("initiating system shutdown");
        if let Err(e) = self.halt.halt_host().await {
            tracing::error!(error = %e, "failed to initiate system shutdown");
        }
    }
}

fn log_snapshot(snapshot: &StatusSnapshot) {
    tracing::info!("battery level: {}%", snapshot.battery_charge_percent);
    tracing::info!("UPS status: {}", snapshot.status_text());
    tracing::info!(
        "battery runtime remaining: {} seconds",
        snapshot.runtime_remaining_secs
    );
}
