use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use upsmon_core::config::MonitorCfg;
use upsmon_core::error::MonitorError;
use upsmon_core::halt::CommandHalt;
use upsmon_core::notify::WebhookNotifier;
use upsmon_core::runtime::{Monitor, MonitorExit};
use upsmon_nut::NutTcpClient;

/// Monitor a UPS through upsd and shut the host down on low battery.
///
/// Every option can also be set through `UPSMON_<KEY>` environment
/// variables (e.g. `UPSMON_WEBHOOK_URL`); flags win over the environment.
#[derive(Debug, Parser)]
#[command(name = "upsmon", version, about, long_about = None)]
struct Cli {
    /// Name of the UPS to monitor
    #[arg(long)]
    ups: Option<String>,

    /// Battery percentage below which the host is shut down
    #[arg(long)]
    threshold: Option<u8>,

    /// Seconds between polls
    #[arg(long)]
    interval: Option<u64>,

    /// URL receiving `{"message": ...}` notifications
    #[arg(long)]
    webhook_url: Option<String>,

    /// upsd host
    #[arg(long)]
    nut_host: Option<String>,

    /// upsd port
    #[arg(long)]
    nut_port: Option<u16>,

    /// Append-only log file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn apply(self, mut cfg: MonitorCfg) -> MonitorCfg {
        if let Some(ups) = self.ups {
            cfg.ups_name = ups;
        }
        if let Some(threshold) = self.threshold {
            cfg.low_battery_threshold = threshold;
        }
        if let Some(interval) = self.interval {
            cfg.check_interval_secs = interval;
        }
        if let Some(url) = self.webhook_url {
            cfg.webhook_url = url;
        }
        if let Some(host) = self.nut_host {
            cfg.nut_host = host;
        }
        if let Some(port) = self.nut_port {
            cfg.nut_port = port;
        }
        if let Some(path) = self.log_file {
            cfg.log_file = path;
        }
        cfg
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cfg = Cli::parse().apply(MonitorCfg::from_env());
    cfg.validate()?;
    upsmon_core::logging::init(&cfg.log_file)?;

    tracing::info!("starting UPS monitor for {}", cfg.ups_name);

    let client = NutTcpClient::new(cfg.nut_host.clone(), cfg.nut_port)
        .with_connect_timeout(cfg.query_timeout());
    let notifier = WebhookNotifier::new(cfg.webhook_url.clone(), cfg.notify_timeout())
        .context("building webhook notifier")?;
    let halt = CommandHalt::from_command_line(&cfg.shutdown_command, cfg.shutdown_timeout())?;

    let cfg = Arc::new(cfg);
    let mut monitor = Monitor::new(
        Arc::clone(&cfg),
        Box::new(client),
        Arc::new(notifier),
        Arc::new(halt),
    );
    monitor.shutdown_guard().spawn_signal_listener();

    match monitor.run().await {
        MonitorExit::UnknownUps { available } => Err(MonitorError::UnknownUps {
            name: cfg.ups_name.clone(),
            available,
        }
        .into()),
        MonitorExit::ShutdownInitiated => {
            tracing::info!("monitor stopped after initiating shutdown");
            Ok(())
        }
        MonitorExit::Cancelled => {
            tracing::info!("monitor stopped by signal");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ups_flag_overrides_environment_layer() {
        let cli = Cli::try_parse_from(["upsmon", "--ups", "rack"]).unwrap();
        let base = MonitorCfg {
            ups_name: "from-env".into(),
            ..MonitorCfg::default()
        };
        let cfg = cli.apply(base);
        assert_eq!(cfg.ups_name, "rack");
        assert_eq!(cfg.low_battery_threshold, 20);
    }

    #[test]
    fn no_flags_keep_base_config() {
        let cli = Cli::try_parse_from(["upsmon"]).unwrap();
        assert_eq!(cli.apply(MonitorCfg::default()), MonitorCfg::default());
    }

    #[test]
    fn all_flags_parse() {
        let cli = Cli::try_parse_from([
            "upsmon",
            "--ups", "cp850",
            "--threshold", "30",
            "--interval", "15",
            "--webhook-url", "https://hooks.local/ups",
            "--nut-host", "10.0.0.2",
            "--nut-port", "3494",
            "--log-file", "/var/log/upsmon.log",
        ])
        .unwrap();
        let cfg = cli.apply(MonitorCfg::default());
        assert_eq!(cfg.ups_name, "cp850");
        assert_eq!(cfg.low_battery_threshold, 30);
        assert_eq!(cfg.check_interval_secs, 15);
        assert_eq!(cfg.webhook_url, "https://hooks.local/ups");
        assert_eq!(cfg.nut_host, "10.0.0.2");
        assert_eq!(cfg.nut_port, 3494);
        assert_eq!(cfg.log_file, PathBuf::from("/var/log/upsmon.log"));
    }

    #[test]
    fn rejects_subcommands_and_unknown_flags() {
        assert!(Cli::try_parse_from(["upsmon", "run"]).is_err());
        assert!(Cli::try_parse_from(["upsmon", "--verbose"]).is_err());
    }
}
