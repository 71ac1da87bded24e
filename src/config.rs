use std::path::{Path, PathBuf};

use beacon_engine::{ConfigError, EngineConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const APP_DIR: &str = "beacon";
const CONFIG_FILE: &str = "config.toml";

#[derive(Error, Debug)]
pub enum AppConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("Failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },

    #[error(transparent)]
    Engine(#[from] ConfigError),
}

/// Host configuration, read from `config.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,

    /// Where log files are written
    pub data_dir: PathBuf,

    /// Show friend notifications on the desktop
    pub desktop_notifications: bool,

    pub engine: EngineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("./")).join(APP_DIR);

        Self {
            log_level: "info".to_string(),
            data_dir,
            desktop_notifications: true,
            engine: EngineConfig::default(),
        }
    }
}

impl AppConfig {
    /// `<config dir>/beacon/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from `path`, or from the default location when it exists.
    ///
    /// An explicit path must exist. `BEACON_*` environment variables override
    /// engine settings from the file.
    pub fn load(path: Option<&Path>) -> Result<Self, AppConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|path| path.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };

        config.engine.apply_env();
        config.engine.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, AppConfigError> {
        debug!("Loading config from {}", path.display());
        let contents = std::fs::read_to_string(path)
            .map_err(|source| AppConfigError::Read { path: path.to_path_buf(), source })?;
        Self::parse(&contents).map_err(|source| AppConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}
