use std::path::PathBuf;

/// Error type for monitor setup and the collaborators it drives.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("UPS {name} not found. Available UPS: {}", .available.join(", "))]
    UnknownUps { name: String, available: Vec<String> },
    #[error("cannot open log file {}: {source}", .path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("logging already initialised: {0}")]
    LogInit(String),
    #[error("notifier setup failed: {0}")]
    Notifier(String),
    #[error("host halt failed: {0}")]
    Halt(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_ups_lists_alternatives() {
        let err = MonitorError::UnknownUps {
            name: "Foo".into(),
            available: vec!["Bar".into(), "Baz".into()],
        };
        assert_eq!(err.to_string(), "UPS Foo not found. Available UPS: Bar, Baz");
    }
}
