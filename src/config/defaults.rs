//! Default configuration values
//!
//! All constants used throughout the config module are defined here.

/// Directory name under the platform data directory
pub const APP_DIR_NAME: &str = "hotkey-registry";

/// Settings file inside the root settings directory
pub const CONFIG_FILE_NAME: &str = "settings.json";

/// Conflict document exported for the settings UI
pub const DEFAULT_CONFLICTS_FILE: &str = crate::hotkeys::DEFAULT_CONFLICTS_FILE;

/// Conflict export is on by default
pub const DEFAULT_PERSIST_CONFLICTS: bool = true;

/// Keep every contender on a handle
pub const DEFAULT_MULTI_OWNER: bool = true;

/// tracing `EnvFilter` directive used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info";
