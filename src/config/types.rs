//! Configuration type definitions

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::defaults::{
    APP_DIR_NAME, DEFAULT_CONFLICTS_FILE, DEFAULT_LOG_FILTER, DEFAULT_MULTI_OWNER,
    DEFAULT_PERSIST_CONFLICTS,
};

/// Settings for the hotkey registry.
///
/// Stored as camelCase JSON; every field may be omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Override of the root settings directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_dir: Option<PathBuf>,
    /// File name of the exported conflict document
    #[serde(default = "default_conflicts_file")]
    pub conflicts_file: String,
    #[serde(default = "default_persist_conflicts")]
    pub persist_conflicts: bool,
    #[serde(default = "default_multi_owner")]
    pub multi_owner: bool,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_conflicts_file() -> String {
    DEFAULT_CONFLICTS_FILE.to_string()
}
fn default_persist_conflicts() -> bool {
    DEFAULT_PERSIST_CONFLICTS
}
fn default_multi_owner() -> bool {
    DEFAULT_MULTI_OWNER
}
fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            settings_dir: None,
            conflicts_file: default_conflicts_file(),
            persist_conflicts: default_persist_conflicts(),
            multi_owner: default_multi_owner(),
            log_filter: default_log_filter(),
        }
    }
}

impl Config {
    /// Root settings directory: the configured override, else the platform
    /// data directory, else the temp dir.
    pub fn settings_root(&self) -> PathBuf {
        match &self.settings_dir {
            Some(dir) => dir.clone(),
            None => default_settings_root(),
        }
    }

    /// Fixed path of the exported conflict document.
    pub fn conflicts_path(&self) -> PathBuf {
        self.settings_root().join(&self.conflicts_file)
    }
}

pub fn default_settings_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}
