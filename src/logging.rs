//! Logging configuration for querycsv.
//!
//! Diagnostics go to stderr. Export metrics (one line per generated file)
//! are emitted on [`EXPORT_LOG_TARGET`] and, when a log directory is given,
//! also appended to a daily rolling `querytocsv.log` file there.

use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Target of the per-export metric events.
pub const EXPORT_LOG_TARGET: &str = "querycsv::export";

/// File name prefix of the daily export log.
pub const EXPORT_LOG_FILE: &str = "querytocsv.log";

/// Initializes stderr logging and, if `export_log_dir` is set, the daily
/// export log file.
///
/// Keep the returned guard alive for the lifetime of the program; dropping
/// it flushes and stops the file writer.
pub fn init_logging(export_log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_filter(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    );

    let (file_layer, guard) = match export_log_dir {
        Some(dir) => {
            if let Err(e) = std::fs::create_dir_all(dir) {
                eprintln!("Warning: Could not create log directory: {e}");
                (None, None)
            } else {
                let appender = RollingFileAppender::new(Rotation::DAILY, dir, EXPORT_LOG_FILE);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(false)
                    .with_filter(Targets::new().with_target(EXPORT_LOG_TARGET, Level::INFO));
                (Some(layer), Some(guard))
            }
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

/// Formats the line logged after an export completes.
pub fn export_log_line(elapsed_ms: f64, file: &str, row_count: Option<u64>) -> String {
    let mut line = format!("Export Execution Time :  {elapsed_ms} milliseconds | File : {file}");
    if let Some(count) = row_count {
        line.push_str(&format!(" | Row Count : {count}"));
    }
    line
}

/// Milliseconds in `elapsed`, rounded to two decimals.
pub fn round_millis(elapsed: std::time::Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0 * 100.0).round() / 100.0
}
