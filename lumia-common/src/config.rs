//! Configuration file discovery, data folder resolution and logging config

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit TOML configuration file
pub const CONFIG_ENV_VAR: &str = "LUMIA_CONFIG";

/// Environment variable naming the data folder (database location)
pub const DATA_FOLDER_ENV_VAR: &str = "LUMIA_DATA_FOLDER";

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Config file resolution in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. Platform config directory (`<config_dir>/lumia/config.toml`)
///
/// Returns None when no candidate exists; callers fall back to compiled
/// defaults rather than failing.
pub fn resolve_config_file(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    let user_config = dirs::config_dir().map(|d| d.join("lumia").join("config.toml"))?;
    if user_config.exists() {
        Some(user_config)
    } else {
        None
    }
}

/// Read a TOML file into `T`, or compiled defaults when the file is absent
///
/// A missing file is not an error: a warning is logged and `T::default()` is
/// returned. An unreadable or malformed file is an error.
pub fn load_toml_or_default<T>(path: Option<&Path>) -> Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    let Some(path) = path else {
        warn!("No configuration file found, using compiled defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        warn!("Configuration file {} does not exist, using compiled defaults", path.display());
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)?;
    let parsed = toml::from_str::<T>(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(parsed)
}

/// Data folder resolution in priority order:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. TOML config value
/// 4. OS-dependent compiled default
pub fn resolve_data_folder(cli_arg: Option<&Path>, toml_value: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(DATA_FOLDER_ENV_VAR) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = toml_value {
        return path.to_path_buf();
    }

    default_data_folder()
}

/// Get OS-dependent default data folder path
pub fn default_data_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/lumia
        dirs::data_local_dir()
            .map(|d| d.join("lumia"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/lumia"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/lumia
        dirs::data_dir()
            .map(|d| d.join("lumia"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/lumia"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\lumia
        dirs::data_local_dir()
            .map(|d| d.join("lumia"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\lumia"))
    } else {
        PathBuf::from("./lumia_data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Deserialize)]
    struct Sample {
        #[serde(default)]
        logging: LoggingConfig,
    }

    #[test]
    fn test_logging_default_level() {
        assert_eq!(LoggingConfig::default().level, "info");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let sample: Sample =
            load_toml_or_default(Some(Path::new("/nonexistent/lumia/config.toml"))).unwrap();
        assert_eq!(sample.logging, LoggingConfig::default());

        let sample: Sample = load_toml_or_default(None).unwrap();
        assert_eq!(sample.logging.level, "info");
    }

    #[test]
    fn test_cli_arg_wins_for_data_folder() {
        let folder = resolve_data_folder(Some(Path::new("/tmp/cli")), Some(Path::new("/tmp/toml")));
        assert_eq!(folder, PathBuf::from("/tmp/cli"));
    }
}
