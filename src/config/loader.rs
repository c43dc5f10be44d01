//! Configuration loading from file system

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use super::defaults::CONFIG_FILE_NAME;
use super::types::{default_settings_root, Config};

/// `<data dir>/hotkey-registry/settings.json`
pub fn default_config_path() -> PathBuf {
    default_settings_root().join(CONFIG_FILE_NAME)
}

/// Load configuration from a JSON settings file.
///
/// Returns `Config::default()` if the file is missing, unreadable or invalid.
#[instrument(name = "load_config", skip_all, fields(path = %path.display()))]
pub fn load_config(path: &Path) -> Config {
    if !path.exists() {
        info!("Config file not found, using defaults");
        return Config::default();
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(error = %e, "Failed to read config file, using defaults");
            return Config::default();
        }
    };

    match serde_json::from_str::<Config>(&content) {
        Ok(config) => {
            info!(
                multi_owner = config.multi_owner,
                persist_conflicts = config.persist_conflicts,
                "Successfully loaded config"
            );
            config
        }
        Err(e) => {
            warn!(error = %e, "Failed to parse config JSON, using defaults");
            Config::default()
        }
    }
}
