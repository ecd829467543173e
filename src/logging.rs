//! Structured logging module for Smartfarm
//!
//! Writes logs to the platform data dir (`smartfarm/logs/`) with categories:
//! - PROFILE: Sign-up and profile lookups
//! - ADVISORY: Generation calls, retries and outcomes
//! - SESSION: Login, logout and startup
//! - ERROR: Storage and configuration failures

use chrono::{Local, Utc};
use once_cell::sync::Lazy;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Log categories for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    Profile,
    Advisory,
    Session,
    Error,
}

impl LogCategory {
    fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Profile => "PROFILE",
            LogCategory::Advisory => "ADVISORY",
            LogCategory::Session => "SESSION",
            LogCategory::Error => "ERROR",
        }
    }
}

/// Directory chosen by `init_logging`; `None` means console only.
static LOG_DIR: Lazy<Mutex<Option<PathBuf>>> = Lazy::new(|| Mutex::new(None));

/// Default log directory path
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("smartfarm")
        .join("logs")
}

const LOG_PREFIX: &str = "smartfarm-";
const LOG_SUFFIX: &str = ".log";

fn log_file_path(dir: &Path) -> PathBuf {
    let today = Local::now().format("%Y-%m-%d").to_string();
    dir.join(format!("{}{}{}", LOG_PREFIX, today, LOG_SUFFIX))
}

/// Initialize the logging system - creates log directory if needed
pub fn init_logging(log_dir: PathBuf) -> std::io::Result<()> {
    if !log_dir.exists() {
        fs::create_dir_all(&log_dir)?;
    }

    if let Ok(mut slot) = LOG_DIR.lock() {
        *slot = Some(log_dir);
    }

    log(LogCategory::Session, None, "Smartfarm logging initialized");

    Ok(())
}

fn format_line(category: LogCategory, session_id: Option<&str>, message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let session_context = session_id
        .map(|id| format!("session={} | ", &id[..8.min(id.len())]))
        .unwrap_or_default();

    format!(
        "[{}] [{}] {}{}\n",
        timestamp,
        category.as_str(),
        session_context,
        message
    )
}

/// Append a line to today's file in `dir`. Returns false if nothing was written.
fn append_to_file(dir: &Path, line: &str) -> bool {
    match OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path(dir))
    {
        Ok(mut file) => file.write_all(line.as_bytes()).is_ok(),
        Err(_) => false,
    }
}

/// Log a message with category and optional session context
///
/// Goes to the log file once `init_logging` has run; stderr otherwise, or
/// when the file cannot be written.
pub fn log(category: LogCategory, session_id: Option<&str>, message: &str) {
    let log_line = format_line(category, session_id, message);

    let dir = match LOG_DIR.lock() {
        Ok(slot) => slot.clone(),
        Err(_) => None,
    };
    let written = dir.map(|dir| append_to_file(&dir, &log_line)).unwrap_or(false);
    if !written {
        eprint!("{}", log_line);
    }
}

pub fn log_profile(session_id: Option<&str>, message: &str) {
    log(LogCategory::Profile, session_id, message);
}

pub fn log_advisory(session_id: Option<&str>, message: &str) {
    log(LogCategory::Advisory, session_id, message);
}

pub fn log_session(session_id: Option<&str>, message: &str) {
    log(LogCategory::Session, session_id, message);
}

pub fn log_error(session_id: Option<&str>, message: &str) {
    log(LogCategory::Error, session_id, message);
}

fn is_log_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with(LOG_PREFIX) && name.ends_with(LOG_SUFFIX))
        .unwrap_or(false)
}

/// Clean up old log files (keep last 7 days). Only `smartfarm-*.log` files are touched.
pub fn cleanup_old_logs(log_dir: &Path) -> std::io::Result<usize> {
    let mut deleted = 0;

    if !log_dir.exists() {
        return Ok(0);
    }

    let cutoff = Utc::now() - chrono::Duration::days(7);

    for entry in fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !is_log_file(&path) || !path.is_file() {
            continue;
        }

        if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
            let modified_time: chrono::DateTime<Utc> = modified.into();
            if modified_time < cutoff && fs::remove_file(&path).is_ok() {
                deleted += 1;
            }
        }
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    #[test]
    fn test_format_line_truncates_session_id() {
        let line = format_line(
            LogCategory::Advisory,
            Some("0123456789abcdef"),
            "Rate limited",
        );
        assert!(line.contains("[ADVISORY] session=01234567 | Rate limited"));
        assert!(line.ends_with('\n'));
    }

    #[test]
    fn test_format_line_without_session() {
        let line = format_line(LogCategory::Error, None, "disk full");
        assert!(line.contains("[ERROR] disk full"));
    }

    #[test]
    fn test_cleanup_keeps_fresh_logs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        fs::write(path.join("smartfarm-today.log"), "x").unwrap();

        assert_eq!(cleanup_old_logs(&path).unwrap(), 0);
        assert!(path.join("smartfarm-today.log").exists());
        assert_eq!(cleanup_old_logs(&path.join("missing")).unwrap(), 0);
    }

    fn age_file(path: &Path, days: u64) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(days * 24 * 60 * 60))
            .unwrap();
    }

    #[test]
    fn test_cleanup_only_removes_old_smartfarm_logs() {
        let dir = tempfile::tempdir().unwrap();
        let old_log = dir.path().join("smartfarm-2020-01-01.log");
        let foreign = dir.path().join("farm_accounts.xlsx");
        let lookalike = dir.path().join("smartfarm-notes.txt");
        for path in [&old_log, &foreign, &lookalike] {
            fs::write(path, "x").unwrap();
            age_file(path, 30);
        }

        assert_eq!(cleanup_old_logs(dir.path()).unwrap(), 1);
        assert!(!old_log.exists());
        assert!(foreign.exists());
        assert!(lookalike.exists());
    }

    #[test]
    fn test_append_to_file_writes_daily_log() {
        let dir = tempfile::tempdir().unwrap();
        let line = format_line(LogCategory::Session, None, "started");

        assert!(append_to_file(dir.path(), &line));
        let written = fs::read_to_string(log_file_path(dir.path())).unwrap();
        assert_eq!(written, line);
        assert!(is_log_file(&log_file_path(dir.path())));

        assert!(!append_to_file(&dir.path().join("missing"), &line));
    }
}
