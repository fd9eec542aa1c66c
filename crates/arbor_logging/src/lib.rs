//! Shared logging utilities for arbor report binaries.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "arbor=info,arbor_report=info,arbor_tape=info";
const HOME_ENV: &str = "ARBOR_HOME";
const HOME_DIR_NAME: &str = ".arbor_report";

/// Logging configuration shared by arbor binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
    /// Keep stderr quiet (errors only) so machine-readable stdout stays clean.
    pub json_mode: bool,
}

/// Initialize tracing with a daily-rolling file writer and stderr output.
///
/// The returned guard flushes the non-blocking file writer on drop and must be
/// held for the lifetime of the process. When the log directory cannot be
/// created the file layer is skipped and `None` is returned.
pub fn init_logging(config: LogConfig<'_>) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let mut log_guard = None;
    let file_layer = match ensure_logs_dir() {
        Ok(log_dir) => {
            let file_appender =
                tracing_appender::rolling::daily(log_dir, format!("{}.log", config.app_name));
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
            log_guard = Some(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(file_writer)
                    .with_ansi(false)
                    .with_filter(env_filter.clone()),
            )
        }
        Err(err) => {
            eprintln!("Warning: failed to create logs directory: {:#}", err);
            None
        }
    };

    let console_filter = if config.verbose {
        EnvFilter::new("debug")
    } else if config.json_mode {
        EnvFilter::new("error")
    } else {
        env_filter
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .init();

    log_guard
}

/// Get the arbor home directory: `$ARBOR_HOME` or `~/.arbor_report`.
///
/// Falls back to the current directory when no home directory is known.
pub fn arbor_home() -> PathBuf {
    if let Ok(override_path) = std::env::var(HOME_ENV) {
        return PathBuf::from(override_path);
    }
    home_under(dirs::home_dir().as_deref())
}

fn home_under(home: Option<&Path>) -> PathBuf {
    home.unwrap_or_else(|| Path::new("."))
        .join(HOME_DIR_NAME)
}

/// Get the logs directory: `<home>/logs`
pub fn logs_dir() -> PathBuf {
    arbor_home().join("logs")
}

/// Get the default engine config path: `<home>/config.toml`
pub fn default_config_path() -> PathBuf {
    arbor_home().join("config.toml")
}

/// Ensure the logs directory exists.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_under_known_home() {
        let home = home_under(Some(Path::new("/home/inspector")));
        assert_eq!(home, PathBuf::from("/home/inspector/.arbor_report"));
    }

    #[test]
    fn test_home_under_unknown_home_is_relative() {
        assert_eq!(home_under(None), PathBuf::from("./.arbor_report"));
    }

    #[test]
    fn test_paths_nest_under_home() {
        let home = arbor_home();
        assert!(logs_dir().starts_with(&home));
        assert!(default_config_path().starts_with(&home));
        assert!(default_config_path().ends_with("config.toml"));
    }
}
