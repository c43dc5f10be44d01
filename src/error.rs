use thiserror::Error;
use tracing::{error, warn};

use crate::hotkeys::{BackendError, Hotkey, PersistenceError, ShortcutParseError};

/// Error severity for UI display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,     // informational
    Warning,  // recoverable
    Error,    // operation failed
    Critical, // requires user action
}

/// Hotkey subsystem errors.
///
/// Conflicts are normally reported as `ConflictKind` values; these variants
/// exist for call sites that need to surface them as errors (CLI, UI).
#[derive(Error, Debug)]
pub enum HotkeyError {
    #[error("Invalid hotkey: {0}")]
    InvalidHotkey(String),

    #[error("Invalid shortcut text: {0}")]
    Parse(#[from] ShortcutParseError),

    #[error("Hotkey {hotkey} is reserved by the system")]
    SystemConflict { hotkey: Hotkey },

    #[error("Hotkey {hotkey} is already used by {module_name}/{hotkey_name}")]
    InAppConflict {
        hotkey: Hotkey,
        module_name: String,
        hotkey_name: String,
    },

    #[error("Action for '{hotkey_name}' failed: {message}")]
    ActionFailed {
        hotkey_name: String,
        message: String,
    },

    #[error("Conflict export failed: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Hotkey backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl HotkeyError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::InvalidHotkey(_) | Self::Parse(_) => ErrorSeverity::Warning,
            Self::SystemConflict { .. } | Self::InAppConflict { .. } => ErrorSeverity::Warning,
            Self::ActionFailed { .. } => ErrorSeverity::Error,
            Self::Persistence(_) => ErrorSeverity::Warning,
            Self::Backend(BackendError::Unavailable(_)) => ErrorSeverity::Critical,
            Self::Backend(_) => ErrorSeverity::Error,
            Self::Config(_) => ErrorSeverity::Info,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidHotkey(msg) => {
                format!("{} is not a valid shortcut: use a modifier and a key", msg)
            }
            Self::Parse(e) => format!("Could not read shortcut: {}", e),
            Self::SystemConflict { hotkey } => {
                format!("{} is reserved by the system or another application", hotkey)
            }
            Self::InAppConflict {
                hotkey,
                module_name,
                hotkey_name,
            } => format!("{} is already used by {} ({})", hotkey, module_name, hotkey_name),
            Self::ActionFailed { hotkey_name, .. } => {
                format!("The action for {} stopped unexpectedly", hotkey_name)
            }
            Self::Persistence(_) => "Could not save the shortcut conflict list".to_string(),
            Self::Backend(e) => format!("Global shortcuts are unavailable: {}", e),
            Self::Config(msg) => format!("Configuration issue: {}", msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, HotkeyError>;

/// Extension trait for silent error logging with caller location tracking.
/// Use when the operation is recoverable and the user doesn't need to know.
///
/// # Examples
///
/// ```ignore
/// use hotkey_registry::error::ResultExt;
///
/// registry.export_conflicts().warn_on_err();
/// ```
pub trait ResultExt<T> {
    /// Log error with caller location and return None. Use for recoverable failures.
    fn log_err(self) -> Option<T>;
    /// Log as warning with caller location and return None. Use for expected failures.
    fn warn_on_err(self) -> Option<T>;
}

impl<T, E: std::fmt::Debug> ResultExt<T> for std::result::Result<T, E> {
    #[track_caller]
    fn log_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                error!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation failed"
                );
                None
            }
        }
    }

    #[track_caller]
    fn warn_on_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                warn!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation had warning"
                );
                None
            }
        }
    }
}
