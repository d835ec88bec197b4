//! gmq-qc runtime configuration
//!
//! Resolved once at startup from the command line and the TOML file.

use crate::session::SessionSettings;
use crate::store::RetryPolicy;
use gmq_common::config::{
    resolve_data_folder, BackendSection, CompiledDefaults, TomlConfig, DATA_FOLDER_ENV,
};
use std::path::{Path, PathBuf};

/// Queue controller configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub data_folder: PathBuf,
    pub playlist_path: PathBuf,
    pub listen_port: u16,
    pub log_level: String,
    pub backend: BackendSection,
    pub session: SessionSettings,
    pub retry: RetryPolicy,
    pub event_capacity: usize,
    pub privileged_secret: Option<String>,
}

impl Config {
    /// Merge command-line values over the TOML file and compiled defaults
    pub fn resolve(cli_port: Option<u16>, cli_data_folder: Option<&Path>, toml: &TomlConfig) -> Self {
        let defaults = CompiledDefaults::for_current_platform();
        let data_folder = resolve_data_folder(cli_data_folder, DATA_FOLDER_ENV, toml);
        let playlist_path = data_folder.join(&toml.store.file_name);

        Self {
            playlist_path,
            data_folder,
            listen_port: cli_port.or(toml.listen_port).unwrap_or(defaults.listen_port),
            log_level: toml.log_level.clone().unwrap_or(defaults.log_level),
            backend: toml.backend.clone(),
            session: SessionSettings::from_config(&toml.session, toml.backend.timeout_ms),
            retry: RetryPolicy::from_config(&toml.store),
            event_capacity: toml.session.event_capacity.max(1),
            privileged_secret: toml.privileged_secret.clone().filter(|s| !s.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cli_port_wins() {
        let toml = TomlConfig {
            listen_port: Some(6000),
            ..Default::default()
        };
        let config = Config::resolve(Some(7000), Some(Path::new("/tmp/gmq")), &toml);
        assert_eq!(config.listen_port, 7000);

        let config = Config::resolve(None, Some(Path::new("/tmp/gmq")), &toml);
        assert_eq!(config.listen_port, 6000);
    }

    #[test]
    fn test_derived_paths_and_settings() {
        let toml = TomlConfig::from_toml_str(
            r#"
            privileged_secret = ""
            [backend]
            timeout_ms = 750
            [store]
            file_name = "lists.json"
            "#,
        )
        .unwrap();
        let config = Config::resolve(None, Some(Path::new("/srv/gmq")), &toml);

        assert_eq!(config.playlist_path, PathBuf::from("/srv/gmq/lists.json"));
        assert_eq!(config.session.backend_timeout, Duration::from_millis(750));
        assert_eq!(config.log_level, "info");
        assert!(config.privileged_secret.is_none());
    }
}
