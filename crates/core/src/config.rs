use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::MonitorError;

/// Prefix for environment overrides, e.g. `UPSMON_WEBHOOK_URL`.
pub const ENV_PREFIX: &str = "UPSMON_";

/// All monitor parameters. Built once at startup from defaults, environment
/// and CLI flags, then shared read-only with the loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorCfg {
    // target
    pub ups_name: String,

    // policy
    pub low_battery_threshold: u8,
    pub check_interval_secs: u64,

    // upsd
    pub nut_host: String,
    pub nut_port: u16,
    pub query_timeout_secs: u64,

    // notifications
    pub webhook_url: String,
    pub notify_timeout_secs: u64,

    // shutdown
    pub shutdown_command: String,
    pub shutdown_timeout_secs: u64,

    // logging
    pub log_file: PathBuf,
}

impl Default for MonitorCfg {
    fn default() -> Self {
        Self {
            ups_name: "CyberPower850".into(),
            low_battery_threshold: 20,
            check_interval_secs: 60,
            nut_host: upsmon_nut::tcp::DEFAULT_HOST.into(),
            nut_port: upsmon_nut::tcp::DEFAULT_PORT,
            query_timeout_secs: 10,
            webhook_url: "http://example.com/notify".into(),
            notify_timeout_secs: 10,
            shutdown_command: "sudo shutdown -h now".into(),
            shutdown_timeout_secs: 30,
            log_file: PathBuf::from("ups_monitor.log"),
        }
    }
}

impl MonitorCfg {
    /// Defaults overlaid with any `UPSMON_*` environment variables.
    pub fn from_env() -> Self {
        let map: HashMap<String, String> = std::env::vars()
            .filter_map(|(k, v)| {
                k.strip_prefix(ENV_PREFIX)
                    .map(|key| (key.to_ascii_lowercase(), v))
            })
            .collect();
        Self::from_map(&map)
    }

    /// Build from a key/value map. Missing or unparsable values keep the default.
    pub fn from_map(m: &HashMap<String, String>) -> Self {
        let d = Self::default();
        Self {
            ups_name: get_or(m, "ups_name", d.ups_name),
            low_battery_threshold: get_or(m, "low_battery_threshold", d.low_battery_threshold),
            check_interval_secs: get_or(m, "check_interval_secs", d.check_interval_secs),
            nut_host: get_or(m, "nut_host", d.nut_host),
            nut_port: get_or(m, "nut_port", d.nut_port),
            query_timeout_secs: get_or(m, "query_timeout_secs", d.query_timeout_secs),
            webhook_url: get_or(m, "webhook_url", d.webhook_url),
            notify_timeout_secs: get_or(m, "notify_timeout_secs", d.notify_timeout_secs),
            shutdown_command: get_or(m, "shutdown_command", d.shutdown_command),
            shutdown_timeout_secs: get_or(m, "shutdown_timeout_secs", d.shutdown_timeout_secs),
            log_file: get_or(m, "log_file", d.log_file),
        }
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        let invalid = |msg: &str| Err(MonitorError::Config(msg.to_owned()));
        if self.ups_name.trim().is_empty() {
            return invalid("ups_name must not be empty");
        }
        if self.low_battery_threshold > 100 {
            return invalid("low_battery_threshold must be a percentage (0-100)");
        }
        if self.check_interval_secs == 0 {
            return invalid("check_interval_secs must be at least 1");
        }
        if self.query_timeout_secs == 0
            || self.notify_timeout_secs == 0
            || self.shutdown_timeout_secs == 0
        {
            return invalid("timeouts must be at least 1 second");
        }
        if self.shutdown_command.split_whitespace().next().is_none() {
            return invalid("shutdown_command must not be empty");
        }
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn get_or<T: std::str::FromStr>(map: &HashMap<String, String>, key: &str, default: T) -> T {
    map.get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
