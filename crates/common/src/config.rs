//! Configuration loading shared by every DevDAO component
//!
//! Configuration lives in YAML files. Any component config implements
//! [`Configuration`] and gets file loading, saving and validation for free;
//! environment overrides are read through the `env_*` helpers below.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Environment variable naming the config file to load
pub const CONFIG_FILE_VAR: &str = "DEVDAO_CONFIG_FILE";

/// Base trait for all configuration types
pub trait Configuration: Serialize + DeserializeOwned + Default {
    /// Validate the configuration
    fn validate(&self) -> Result<()>;

    /// Load configuration from a YAML file
    fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_yaml(&content)
    }

    /// Load configuration from a YAML string
    fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a YAML file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::configuration(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| Error::configuration(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

/// Read an environment variable and parse it, `None` when unset
pub fn env_parsed<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::configuration(format!("Invalid value for {}: {}", key, e))),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(Error::configuration(format!("{}: {}", key, e))),
    }
}

/// Read an environment variable as a string, `None` when unset
pub fn env_string(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Config file path from `DEVDAO_CONFIG_FILE`, if it names an existing file
pub fn config_file_from_env() -> Option<String> {
    env_string(CONFIG_FILE_VAR).filter(|p| Path::new(p).exists())
}
