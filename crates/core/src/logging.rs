//! Tracing subscriber setup for the `upsmon` binary.
//!
//! Two sinks: an append-only log file with one `timestamp - LEVEL - message`
//! line per event, and a regular fmt layer on stderr.
//!
//! Filter priority: `UPSMON_LOG`, then `RUST_LOG`, then `info`.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::{DefaultFields, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::error::MonitorError;

pub const LOG_ENV: &str = "UPSMON_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

/// `2026-10-18 14:03:07,512 - INFO - battery level: 87%`
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f");
        write!(writer, "{now} - {} - ", event.metadata().level())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Layer appending [`LineFormat`] lines to `path`, creating the file if needed.
pub fn file_layer<S>(
    path: &Path,
) -> Result<tracing_subscriber::fmt::Layer<S, DefaultFields, LineFormat, Mutex<File>>, MonitorError>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| MonitorError::LogFile {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .event_format(LineFormat)
        .with_writer(Mutex::new(file)))
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init(log_file: &Path) -> Result<(), MonitorError> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(build_env_filter())
        .with(file_layer(log_file)?)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| MonitorError::LogInit(e.to_string()))
}

fn build_env_filter() -> EnvFilter {
    if let Ok(directives) = std::env::var(LOG_ENV)
        && let Ok(filter) = EnvFilter::try_new(&directives)
    {
        return filter;
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}
