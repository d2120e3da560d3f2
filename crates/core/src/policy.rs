//! Per-cycle decision policy.
//!
//! Evaluation looks only at the current snapshot and the thresholds. There
//! is no memory of earlier cycles, so a sustained outage repeats the same
//! notices every interval and a return to line power produces none.

use crate::config::MonitorCfg;
use crate::status::StatusSnapshot;

/// Announcement sent by the shutdown path right before halting the host.
pub const SHUTDOWN_ANNOUNCEMENT: &str = "Shutting down the system due to low battery.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// Charge (percent) strictly below which the host is shut down.
    pub low_battery_threshold: u8,
}

impl Policy {
    pub fn from_cfg(cfg: &MonitorCfg) -> Self {
        Self {
            low_battery_threshold: cfg.low_battery_threshold,
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::from_cfg(&MonitorCfg::default())
    }
}

/// A notification the policy wants sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// `OL` missing from the status flags.
    AbnormalStatus { status: String },
    /// `OB` present.
    PowerLoss { charge: u8 },
    /// Charge below threshold; always followed by the shutdown path.
    CriticalBattery { charge: u8 },
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Self::AbnormalStatus { status } => {
                format!("Warning: UPS not on line power (status: {status})")
            }
            Self::PowerLoss { charge } => {
                format!("Power outage detected. Battery level: {charge}%")
            }
            Self::CriticalBattery { charge } => {
                format!("Warning: low battery level ({charge}%) - shutting down the system.")
            }
        }
    }
}

/// Outcome of evaluating one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Evaluation {
    /// Notices in send order.
    pub notices: Vec<Notice>,
    /// Whether the shutdown path must run after the notices go out.
    pub shutdown: bool,
}

/// Decide what to send and whether to shut down.
///
/// Every check runs; they are not mutually exclusive. A snapshot whose
/// variables could not be fetched never triggers shutdown, since its charge
/// of 0 is a placeholder rather than a reading.
pub fn evaluate(snapshot: &StatusSnapshot, policy: &Policy) -> Evaluation {
    let mut eval = Evaluation::default();
    let charge = snapshot.battery_charge_percent;

    if !snapshot.is_on_line() {
        eval.notices.push(Notice::AbnormalStatus {
            status: snapshot.status_text().to_owned(),
        });
    }
    if snapshot.is_on_battery() {
        eval.notices.push(Notice::PowerLoss { charge });
    }
    if snapshot.is_reported() && charge < policy.low_battery_threshold {
        eval.notices.push(Notice::CriticalBattery { charge });
        eval.shutdown = true;
    }

    eval
}
