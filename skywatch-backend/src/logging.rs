use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};
use anyhow::Context;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};

#[allow(dead_code)]
pub struct LoggerGuard(WorkerGuard);

/// Install the global subscriber: daily-rolling file log plus console on stderr.
///
/// stdout stays free for the rendered report.
pub fn init_logging(
    log_dir: impl AsRef<Path>,
    prefix: &str,
    level: &str,
    retention_days: u64,
) -> anyhow::Result<LoggerGuard> {
    let log_dir = log_dir.as_ref().to_path_buf();
    let level = normalize_level(level);

    let builder = EnvFilter::builder()
        .with_default_directive(level.into());

    let console_filter = builder.clone().parse_lossy(std::env::var("RUST_LOG").unwrap_or_default());
    let file_filter = builder.parse_lossy(std::env::var("RUST_LOG").unwrap_or_default());

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(&log_dir)
        .context("Failed to create file appender")?;
    let (non_blocking, guard) = NonBlocking::new(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(file_filter);
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if retention_days > 0 {
        start_log_cleanup_task(log_dir, prefix.to_string(), retention_days);
    }

    Ok(LoggerGuard(guard))
}

fn normalize_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => {
            eprintln!("Invalid log level '{}', defaulting to 'info'", level);
            LevelFilter::INFO
        },
    }
}

fn start_log_cleanup_task(log_dir: PathBuf, prefix: String, retention_days: u64) {
    const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);
    let max_age = Duration::from_secs(60 * 60 * 24 * retention_days);

    // Only meaningful when a runtime is around; one-shot CLI runs skip it.
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        return;
    };

    handle.spawn(async move {
        loop {
            if let Err(e) = cleanup_old_logs(&log_dir, &prefix, max_age) {
                tracing::warn!("Failed to delete old log file: {}", e);
            }
            tokio::time::sleep(CLEANUP_INTERVAL).await;
        }
    });
}

fn cleanup_old_logs(log_dir: &Path, prefix: &str, max_age: Duration) -> std::io::Result<usize> {
    let now = SystemTime::now();
    let mut removed = 0;

    for entry in fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();

        if let Some(file_name) = path.file_name().and_then(|n| n.to_str()) {
            if file_name.starts_with(prefix) && file_name.ends_with(".log") {
                let metadata = fs::metadata(&path)?;
                if let Ok(modified) = metadata.modified() {
                    if now.duration_since(modified).unwrap_or_default() > max_age {
                        fs::remove_file(&path)?;
                        removed += 1;
                        tracing::info!("Old log file deleted: {}", file_name);
                    }
                }
            }
        }
    }
    Ok(removed)
}
