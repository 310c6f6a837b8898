//! Settings file discovery and loading
//!
//! Lookup order for the config file:
//! 1. an explicit path (the `--config` flag)
//! 2. the `SUNFACE_CONFIG` environment variable
//! 3. `<config_dir>/sunface/config.toml`

use std::path::{Path, PathBuf};

use sunface_core::prelude::*;

use super::types::Settings;

/// Environment variable that overrides the config file location
pub const CONFIG_ENV_VAR: &str = "SUNFACE_CONFIG";

const CONFIG_DIR: &str = "sunface";
const CONFIG_FILENAME: &str = "config.toml";

/// `<config_dir>/sunface/config.toml`, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILENAME))
}

/// Pick the config file to read
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
        _ => default_config_path(),
    }
}

/// Load settings, falling back to defaults on any problem.
///
/// A missing file is normal and logged at debug level. An unreadable or
/// malformed file is logged as a warning.
pub fn load_settings(explicit: Option<&Path>) -> Settings {
    let Some(config_path) = resolve_config_path(explicit) else {
        debug!("No config directory available, using defaults");
        return Settings::default();
    };

    match load_settings_from(&config_path) {
        Ok(settings) => settings,
        Err(Error::ConfigNotFound { path }) => {
            debug!("No config file at {:?}, using defaults", path);
            Settings::default()
        }
        Err(e) => {
            warn!("Ignoring config file {:?}: {}", config_path, e);
            Settings::default()
        }
    }
}

/// Load settings from exactly `path`, failing on any problem
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Err(Error::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("Failed to read {}: {}", path.display(), e)))?;

    let settings = toml::from_str(&content)
        .map_err(|e| Error::config_invalid(format!("{}: {}", path.display(), e)))?;

    debug!("Loaded settings from {:?}", path);
    Ok(settings)
}
