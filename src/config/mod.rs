//! Configuration module - registry settings
//!
//! # Module Structure
//!
//! - `defaults` - All default constant values
//! - `types` - The `Config` struct and derived paths
//! - `loader` - File system loading and parsing

mod defaults;
mod loader;
mod types;

pub use defaults::{APP_DIR_NAME, CONFIG_FILE_NAME};
pub use loader::{default_config_path, load_config};
pub use types::{default_settings_root, Config};

#[cfg(test)]
pub use defaults::{
    DEFAULT_CONFLICTS_FILE, DEFAULT_LOG_FILTER, DEFAULT_MULTI_OWNER, DEFAULT_PERSIST_CONFLICTS,
};

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
