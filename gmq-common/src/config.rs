//! Configuration loading and data folder resolution
//!
//! Resolution order for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing TOML file is not an error: a warning is logged and compiled
//! defaults are used. A TOML file that exists but does not parse is.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the data folder
pub const DATA_FOLDER_ENV: &str = "GMQ_DATA_FOLDER";

/// Compiled defaults used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub data_folder: PathBuf,
    pub log_level: String,
    pub listen_port: u16,
}

impl CompiledDefaults {
    /// Defaults for the platform this binary was built for
    pub fn for_current_platform() -> Self {
        Self {
            data_folder: default_data_folder(),
            log_level: "info".to_string(),
            listen_port: 5780,
        }
    }
}

/// Audio backend connection settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendSection {
    /// Base URL of the backend REST API
    pub url: String,
    /// Value sent in the Authorization header
    pub password: String,
    /// Backend session the players belong to
    pub session_id: String,
    /// Calls not acknowledged within this window fail
    pub timeout_ms: u64,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:2333".to_string(),
            password: "youshallnotpass".to_string(),
            session_id: String::new(),
            timeout_ms: 5000,
        }
    }
}

/// Playback session settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionSection {
    /// Delay between queue exhaustion and automatic teardown
    pub grace_period_ms: u64,
    /// Volume a new session starts with (1-100)
    pub default_volume: u16,
    /// Reject tracks whose url is already current or queued
    pub reject_duplicate_urls: bool,
    /// Event bus buffer size
    pub event_capacity: usize,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            grace_period_ms: 5000,
            default_volume: 100,
            reject_duplicate_urls: false,
            event_capacity: 1000,
        }
    }
}

/// Playlist store settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreSection {
    /// Document file name inside the data folder
    pub file_name: String,
    /// Total write attempts before a mutation is reported as failed
    pub write_attempts: u32,
    /// Backoff before the first retry; doubled for each further retry
    pub retry_backoff_ms: u64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            file_name: "playlists.json".to_string(),
            write_attempts: 3,
            retry_backoff_ms: 100,
        }
    }
}

/// Contents of the TOML configuration file
///
/// Every field is optional; absent sections fall back to their defaults.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    pub data_folder: Option<PathBuf>,
    pub log_level: Option<String>,
    pub listen_port: Option<u16>,
    /// Shared secret for privileged commands (absent disables them)
    pub privileged_secret: Option<String>,
    pub backend: BackendSection,
    pub session: SessionSection,
    pub store: StoreSection,
}

impl TomlConfig {
    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Load the config file, tolerating its absence
    ///
    /// `explicit` is a path given on the command line or in the environment;
    /// when it is None the platform locations are searched.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match find_config_file() {
                Some(path) => path,
                None => {
                    warn!("No config file found, using compiled defaults");
                    return Ok(Self::default());
                }
            },
        };

        match std::fs::read_to_string(&path) {
            Ok(content) => {
                info!("Loading configuration from {}", path.display());
                Self::from_toml_str(&content)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Config file {} not found, using compiled defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(Error::Config(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

/// Data folder resolution following the priority order in the module docs
pub fn resolve_data_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml: &TomlConfig,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &toml.data_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    CompiledDefaults::for_current_platform().data_folder
}

/// Search the platform config locations
fn find_config_file() -> Option<PathBuf> {
    // ~/.config/gmq/config.toml first, then /etc/gmq/config.toml
    let user_config = dirs::config_dir().map(|d| d.join("gmq").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/gmq/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Get OS-dependent default data folder path
fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("gmq"))
        .unwrap_or_else(|| PathBuf::from("./gmq_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.session.grace_period_ms, 5000);
        assert_eq!(config.store.file_name, "playlists.json");
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
            [session]
            grace_period_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.session.grace_period_ms, 250);
        assert_eq!(config.session.default_volume, 100);
        assert_eq!(config.backend.timeout_ms, 5000);
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let result = TomlConfig::from_toml_str("listen_port = \"not a number\"");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
