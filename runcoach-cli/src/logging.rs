//! Tracing setup: console output plus an append-only log file.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Log file name inside `<config_dir>/logs`.
pub const LOG_FILE: &str = "running_coach.log";

/// Directory holding log files for a config directory.
pub fn log_dir(config_dir: &Path) -> PathBuf {
    config_dir.join("logs")
}

/// Initialize logging.
///
/// `RUST_LOG` wins over `default_level`; `verbose` forces debug output.
/// If the log file cannot be opened, logging continues on the console only.
pub fn init_logging(verbose: bool, default_level: &str, config_dir: &Path) {
    let level = if verbose { "debug" } else { default_level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, file_error) = match open_log_file(&log_dir(config_dir)) {
        Ok(file) => {
            let layer = fmt::layer().with_ansi(false).with_writer(Mutex::new(file));
            (Some(layer), None)
        }
        Err(e) => (None, Some(e)),
    };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    match file_error {
        None => tracing::debug!("Logging initialized"),
        Some(e) => tracing::warn!("File logging disabled: {}", e),
    }
}

fn open_log_file(dir: &Path) -> std::io::Result<File> {
    fs::create_dir_all(dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE))
}
