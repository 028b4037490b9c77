//! Ready-made log sink for hosts that have none.
//!
//! Everything in this crate logs through the `log` facade, so any logger the
//! host installs receives bootstrap and handshake diagnostics. [`initialize`]
//! installs one that writes colored lines to stdout and plain lines to
//! `bus-client.log`.

use crate::error::logger::LoggerError;

use common::ErrorLocation;

use std::fmt::{Arguments, Display};
use std::io::stdout;
use std::panic::Location;
use std::path::Path;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use fern::colors::Color::{Blue, Green, Magenta, Red, Yellow};
use fern::colors::ColoredLevelConfig;
use fern::{Dispatch, FormatCallback};
use humantime::format_rfc3339;
use log::{LevelFilter, Record, info, warn};

static INIT_LOGGER_ONCE: Once = Once::new();

static LOGGER_ALREADY_CALLED: AtomicBool = AtomicBool::new(false);

pub const LOG_FILE_NAME: &str = "bus-client.log";

const LOGGER_INITIALIZED_MESSAGE_PREFIX: &str = "Logger initialized with level: ";
const LOGGER_ALREADY_INITIALIZED_MESSAGE: &str = "Logger already initialized";

#[cfg(debug_assertions)]
const LOG_LEVEL: LevelFilter = LevelFilter::Debug;

#[cfg(not(debug_assertions))]
const LOG_LEVEL: LevelFilter = LevelFilter::Info;

/// Install the stdout + file logger.
///
/// Safe to call more than once: later calls log a warning and return `Ok`.
///
/// # Errors
///
/// Returns [`LoggerError::Init`] if `log_dir` or the log file cannot be
/// created, or another logger is already installed.
pub fn initialize(log_dir: &Path) -> Result<(), LoggerError> {
    if LOGGER_ALREADY_CALLED.swap(true, Ordering::SeqCst) {
        warn!("{LOGGER_ALREADY_INITIALIZED_MESSAGE}");
        return Ok(());
    }

    let mut result = Ok(());

    INIT_LOGGER_ONCE.call_once(|| {
        result = initialize_internal(log_dir);
        if result.is_ok() {
            info!("{LOGGER_INITIALIZED_MESSAGE_PREFIX}{LOG_LEVEL:?}");
        }
    });

    result
}

fn write_line(
    out: FormatCallback<'_>,
    level: impl Display,
    message: &Arguments<'_>,
    record: &Record<'_>,
) {
    out.finish(format_args!(
        "[{date} - {level}] {target}: {message} [{file}:{line}]",
        date = format_rfc3339(SystemTime::now()),
        target = record.target(),
        file = record.file().unwrap_or("unknown"),
        line = record.line().unwrap_or(0),
    ))
}

#[track_caller]
fn initialize_internal(log_dir: &Path) -> Result<(), LoggerError> {
    std::fs::create_dir_all(log_dir).map_err(|e| LoggerError::Init {
        message: format!("Failed to create log directory {}: {e}", log_dir.display()),
        location: ErrorLocation::from(Location::caller()),
    })?;
    let log_file_path = log_dir.join(LOG_FILE_NAME);

    let color_configuration = ColoredLevelConfig::new()
        .debug(Blue)
        .info(Green)
        .warn(Yellow)
        .error(Red)
        .trace(Magenta);

    let stdout_dispatch = Dispatch::new()
        .format(move |out, message, record| {
            write_line(out, color_configuration.color(record.level()), message, record)
        })
        .chain(stdout());

    // No color codes in the file
    let file_dispatch = Dispatch::new()
        .format(|out, message, record| write_line(out, record.level(), message, record))
        .chain(
            fern::log_file(&log_file_path).map_err(|e| LoggerError::Init {
                message: format!("Failed to create log file: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?,
        );

    Dispatch::new()
        .level(LOG_LEVEL)
        .chain(stdout_dispatch)
        .chain(file_dispatch)
        .apply()
        .map_err(|e| LoggerError::Init {
            message: format!("Failed to initialize logger: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    Ok(())
}
