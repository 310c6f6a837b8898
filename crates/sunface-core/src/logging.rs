//! Logging configuration using tracing
//!
//! Everything goes to a daily-rotated file; stdout is reserved for the
//! NDJSON frame stream.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::Result;

/// Filter directives, e.g. `SUNFACE_LOG=sunface_link=trace`
pub const LOG_FILTER_ENV_VAR: &str = "SUNFACE_LOG";

/// Overrides the log directory
pub const LOG_DIR_ENV_VAR: &str = "SUNFACE_LOG_DIR";

/// Prefix of every log file; the appender adds `.YYYY-MM-DD`
const LOG_FILE_PREFIX: &str = "sunface.log";

/// Every workspace crate at info, dependencies at warn
const DEFAULT_FILTER: &str = "sunface=info,sunface_app=info,sunface_link=info,sunface_core=info,warn";

/// Initialize the logging subsystem
///
/// Logs are written to `<data_local_dir>/sunface/logs/` unless
/// `SUNFACE_LOG_DIR` points elsewhere. Log level is controlled by the
/// `SUNFACE_LOG` environment variable.
///
/// # Examples
/// ```bash
/// SUNFACE_LOG=debug sunface
/// SUNFACE_LOG=sunface_link=trace sunface
/// SUNFACE_LOG_DIR=/tmp/sunface sunface
/// ```
pub fn init() -> Result<()> {
    let log_dir = get_log_directory();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_PREFIX);

    let env_filter = EnvFilter::try_from_env(LOG_FILTER_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .init();

    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("sunface starting");
    tracing::info!(
        "Log file: {}",
        log_file_for(&log_dir, Utc::now().date_naive()).display()
    );
    tracing::info!("═══════════════════════════════════════════════════════");

    Ok(())
}

/// Get the log directory path
pub fn get_log_directory() -> PathBuf {
    resolve_log_directory(std::env::var_os(LOG_DIR_ENV_VAR), dirs::data_local_dir())
}

fn resolve_log_directory(override_dir: Option<OsString>, data_dir: Option<PathBuf>) -> PathBuf {
    match override_dir {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => data_dir
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sunface")
            .join("logs"),
    }
}

/// File the appender writes on `date` (UTC, which is what it rotates on)
pub fn log_file_for(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("{}.{}", LOG_FILE_PREFIX, date.format("%Y-%m-%d")))
}
