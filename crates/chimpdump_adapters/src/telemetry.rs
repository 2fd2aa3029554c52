use std::path::{Path, PathBuf};

use chimpdump_core::Error;
use directories::ProjectDirs;
use tracing::subscriber::set_global_default;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Directory receiving the daily rolling log files.
pub fn log_dir() -> PathBuf {
    ProjectDirs::from("com", "chimpdump", "chimpdump")
        .map(|d| d.data_local_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Install the global subscriber: `RUST_LOG` (or `env_filter`) filtered,
/// pretty output on stderr plus a plain daily log file in [`log_dir`].
///
/// Keep the returned guard alive until exit so the file writer flushes.
pub fn init_subscriber(name: &str, env_filter: &str) -> Result<WorkerGuard, Error> {
    init_subscriber_in(&log_dir(), name, env_filter)
}

/// Same as [`init_subscriber`], writing the log files into `dir`.
pub fn init_subscriber_in(dir: &Path, name: &str, env_filter: &str) -> Result<WorkerGuard, Error> {
    LogTracer::init()
        .map_err(|e| Error::Configuration(format!("failed to initialize log tracer bridge: {}", e)))?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env_filter));

    let formatting_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .pretty();

    let file_appender = tracing_appender::rolling::daily(dir, format!("{}.log", name));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().with_ansi(false).with_writer(non_blocking);

    let subscriber = Registry::default()
        .with(env_filter)
        .with(formatting_layer)
        .with(file_layer);

    set_global_default(subscriber)
        .map_err(|e| Error::Configuration(format!("failed to set global tracing subscriber: {}", e)))?;

    Ok(guard)
}
