use crate::config::LogFormat;
use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Install the global subscriber: console output in `format` filtered by
/// `RUST_LOG` (default `info`), plus JSON lines at `info` and above in a
/// daily-rotated `log_file` when given.
pub fn init(format: LogFormat, log_file: Option<&Path>, max_files: usize) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console: Box<dyn Layer<Registry> + Send + Sync> = match format {
        LogFormat::Text => fmt::layer().boxed(),
        LogFormat::Json => fmt::layer().json().with_current_span(true).boxed(),
    };

    let file = match log_file {
        Some(path) => Some(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_thread_names(true)
                .with_writer(rolling_file(path, max_files)?)
                .with_filter(LevelFilter::INFO),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(console.with_filter(filter))
        .with(file)
        .try_init()
        .context("installing tracing subscriber")
}

/// Appender writing `<dir>/<name>.YYYY-MM-DD`, keeping at most `max_files`.
fn rolling_file(path: &Path, max_files: usize) -> Result<RollingFileAppender> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("log file {} has no file name", path.display()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(name)
        .max_log_files(max_files)
        .build(dir)
        .with_context(|| format!("opening log file {}", path.display()))
}
