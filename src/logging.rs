//! Structured JSONL logging plus human-readable stderr output.
//!
//! - **JSONL to file** (`<settings root>/logs/hotkey-registry.jsonl`) - one JSON object per line
//! - **Compact to stderr** - for developers running the CLI
//!
//! # Usage
//!
//! ```rust,ignore
//! use hotkey_registry::{config, logging};
//!
//! let config = config::load_config(&config::default_config_path());
//! // Keep the guard alive for the duration of the program
//! let _guard = logging::init(&config);
//!
//! tracing::info!(event_type = "hotkey_added", module = "Launcher", "Hotkey record added");
//! ```
//!
//! `RUST_LOG` overrides the configured filter.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

const LOG_FILE_NAME: &str = "hotkey-registry.jsonl";

/// Guard that must be kept alive for the duration of the program.
/// Dropping it flushes and closes the log file.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    log_path: PathBuf,
}

impl LoggingGuard {
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

/// Directory holding the JSONL log.
pub fn log_dir(config: &Config) -> PathBuf {
    config.settings_root().join("logs")
}

pub fn log_path(config: &Config) -> PathBuf {
    log_dir(config).join(LOG_FILE_NAME)
}

/// Build the filter: `RUST_LOG` if set and valid, else the configured one,
/// else `info`.
pub fn env_filter(config: &Config) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the dual-output logging system.
///
/// Safe to call more than once; later calls keep the first subscriber.
pub fn init(config: &Config) -> LoggingGuard {
    let log_dir = log_dir(config);
    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("[LOGGING] Failed to create log directory: {}", e);
    }
    let log_path = log_dir.join(LOG_FILE_NAME);

    let file: Box<dyn Write + Send> = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => Box::new(file),
        Err(e) => {
            eprintln!("[LOGGING] Failed to open log file: {}", e);
            Box::new(std::io::sink())
        }
    };

    // Non-blocking so a slow disk never stalls the hook thread
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file);

    let json_layer = fmt::layer()
        .json()
        .with_writer(non_blocking_file)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_level(true)
        .with_thread_names(true)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE);

    let pretty_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .compact();

    let installed = tracing_subscriber::registry()
        .with(env_filter(config))
        .with(json_layer)
        .with(pretty_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(
            event_type = "app_lifecycle",
            action = "started",
            log_path = %log_path.display(),
            "Logging initialized"
        );
    }

    LoggingGuard {
        _file_guard: file_guard,
        log_path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn log_path_lives_under_settings_root() {
        let dir = tempdir().unwrap();
        let config = Config {
            settings_dir: Some(dir.path().to_path_buf()),
            ..Config::default()
        };
        assert_eq!(
            log_path(&config),
            dir.path().join("logs").join("hotkey-registry.jsonl")
        );
    }

    #[test]
    fn init_creates_log_file() {
        let dir = tempdir().unwrap();
        let config = Config {
            settings_dir: Some(dir.path().to_path_buf()),
            ..Config::default()
        };
        let guard = init(&config);
        assert!(guard.log_path().exists());
        assert_eq!(guard.log_path(), log_path(&config));
    }
}
