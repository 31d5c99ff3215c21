use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use colored::*;
use glob::glob;

use crate::errors::PollerError;

/// Maps a textual level to a filter. Unknown names fall back to `Info`.
pub fn parse_level(level: &str) -> log::LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "warn" => log::LevelFilter::Warn,
        "error" | "fatal" => log::LevelFilter::Error,
        "off" => log::LevelFilter::Off,
        _ => log::LevelFilter::Info,
    }
}

/// Keeps only the newest `<app_name>-*.log` file in `log_dir`.
///
/// File names embed a sortable timestamp, so name order is age order.
fn rotate_logs(app_name: &str, log_dir: &Path) {
    let pattern = format!("{}/{}-*.log", log_dir.display(), app_name);
    let mut log_files: Vec<PathBuf> = match glob(&pattern) {
        Ok(paths) => paths.filter_map(Result::ok).collect(),
        Err(e) => {
            eprintln!("Invalid log rotation pattern {}: {}", pattern, e);
            return;
        }
    };

    log_files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

    for old_file in log_files.iter().skip(1) {
        if let Err(e) = fs::remove_file(old_file) {
            eprintln!("Error deleting old log file {}: {}", old_file.display(), e);
        }
    }
}

fn colored_level(level: log::Level) -> ColoredString {
    match level {
        log::Level::Error => level.as_str().bright_red(),
        log::Level::Warn => level.as_str().bright_yellow(),
        log::Level::Info => level.as_str().bright_green(),
        log::Level::Debug => level.as_str().bright_white(),
        log::Level::Trace => level.as_str().bright_cyan(),
    }
}

/// # Setup Logging
///
/// Installs the global `log` backend for a host process: colored lines on
/// stderr and plain lines in `<log_dir>/<app_name>-<timestamp>.log`. Older log
/// files of the same app are rotated away first.
///
/// Returns the path of the new log file.
pub fn setup_logging(
    app_name: &str,
    log_dir: &Path,
    level: log::LevelFilter,
) -> Result<PathBuf, PollerError> {
    fs::create_dir_all(log_dir)?;
    rotate_logs(app_name, log_dir);

    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let log_path = log_dir.join(format!("{}-{}.log", app_name, timestamp));

    let console = fern::Dispatch::new()
        .format(|out, message, record| {
            let ts = Local::now().format("[%Y-%m-%d %H:%M:%S]").to_string();
            out.finish(format_args!(
                "{}[{}][{}] {}",
                ts.as_str().truecolor(128, 128, 128),
                record.target(),
                colored_level(record.level()),
                message
            ))
        })
        .chain(std::io::stderr());

    let file = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                Local::now().format("[%Y-%m-%d %H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .chain(fern::log_file(&log_path)?);

    fern::Dispatch::new()
        .level(level)
        .chain(console)
        .chain(file)
        .apply()?;

    Ok(log_path)
}
