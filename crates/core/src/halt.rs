use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::MonitorError;

/// Irreversibly halts the host.
///
/// On success the host goes down, so a return (Ok or Err) only tells the
/// caller what to log.
#[async_trait::async_trait]
pub trait ShutdownTrigger: Send + Sync {
    async fn halt_host(&self) -> Result<(), MonitorError>;
}

/// Runs a shutdown command line such as `sudo shutdown -h now`.
#[derive(Debug, Clone)]
pub struct CommandHalt {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandHalt {
    /// Split `command` on whitespace into program and arguments.
    pub fn from_command_line(command: &str, timeout: Duration) -> Result<Self, MonitorError> {
        let mut words = command.split_whitespace().map(str::to_owned);
        let program = words
            .next()
            .ok_or_else(|| MonitorError::Config("shutdown_command must not be empty".into()))?;
        Ok(Self {
            program,
            args: words.collect(),
            timeout,
        })
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait::async_trait]
impl ShutdownTrigger for CommandHalt {
    async fn halt_host(&self) -> Result<(), MonitorError> {
        let result = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(&self.program)
                .args(&self.args)
                .kill_on_drop(true)
                .status(),
        )
        .await;

        match result {
            Ok(Ok(status)) if status.success() => Ok(()),
            Ok(Ok(status)) => Err(MonitorError::Halt(format!(
                "`{}` exited with {status}",
                self.command_line()
            ))),
            Ok(Err(e)) => Err(MonitorError::Halt(format!(
                "cannot run `{}`: {e}",
                self.command_line()
            ))),
            Err(_) => Err(MonitorError::Halt(format!(
                "`{}` did not finish within {:?}",
                self.command_line(),
                self.timeout
            ))),
        }
    }
}

/// Mock trigger for testing. Counts invocations instead of halting.
#[derive(Debug, Clone, Default)]
pub struct MockHalt {
    calls: Arc<AtomicUsize>,
    fail: bool,
}

impl MockHalt {
    pub fn new() -> Self {
        Self::default()
    }

    /// A trigger whose every invocation fails.
    pub fn failing() -> Self {
        Self {
            calls: Arc::default(),
            fail: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ShutdownTrigger for MockHalt {
    async fn halt_host(&self) -> Result<(), MonitorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(MonitorError::Halt("mock halt failure".into()))
        } else {
            Ok(())
        }
    }
}
