//! Logger setup for the binary.
//!
//! - `RUST_LOG` wins when set; otherwise `info` (or `debug` with `--verbose`)
//! - with a log directory, records go to `logfile_<timestamp>.log` there as
//!   `<timestamp> - <LEVEL> - <message>`; otherwise to stderr

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use env_logger::{Builder, Env, Target};

use crate::error::AppError;

/// `logfile_%Y%m%d_%H%M%S.log` inside `dir`.
pub fn log_file_path(dir: &Path, now: DateTime<Local>) -> PathBuf {
    dir.join(format!("logfile_{}.log", now.format("%Y%m%d_%H%M%S")))
}

/// One line of the file log format.
pub fn format_log_line(timestamp: DateTime<Local>, level: log::Level, message: &std::fmt::Arguments<'_>) -> String {
    format!("{} - {level} - {message}", timestamp.format("%Y-%m-%d %H:%M:%S,%3f"))
}

/// Install the global logger. Returns the log file path when one was opened.
pub fn init_logging(verbose: bool, log_dir: Option<&Path>, now: DateTime<Local>) -> Result<Option<PathBuf>, AppError> {
    let default_level = if verbose { "debug" } else { "info" };
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_level));

    let log_path = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .map_err(|e| AppError::new(2, format!("Failed to create log directory '{}': {e}", dir.display())))?;
            let path = log_file_path(dir, now);
            let file = File::create(&path)
                .map_err(|e| AppError::new(2, format!("Failed to create log file '{}': {e}", path.display())))?;
            builder
                .target(Target::Pipe(Box::new(file)))
                .format(|buf, record| writeln!(buf, "{}", format_log_line(Local::now(), record.level(), record.args())));
            Some(path)
        }
        None => None,
    };

    builder
        .try_init()
        .map_err(|e| AppError::new(2, format!("Failed to initialise logging: {e}")))?;
    Ok(log_path)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn file_name_and_line_format() {
        let now = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            log_file_path(Path::new("logs"), now),
            Path::new("logs").join("logfile_20240102_030405.log")
        );
        let line = format_log_line(now, log::Level::Warn, &format_args!("H0 = {}", 70));
        assert_eq!(line, "2024-01-02 03:04:05,000 - WARN - H0 = 70");
    }
}
