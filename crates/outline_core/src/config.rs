//! Store configuration loaded from `outline.toml`.
//!
//! ```toml
//! [store]
//! db_path = "outline.sqlite3"
//! busy_timeout_ms = 5000
//! id_max_attempts = 8
//!
//! [logging]
//! level = "info"
//! log_dir = "/var/log/outline"   # omit to disable file logging
//! ```
//!
//! Every field has a default, so a missing or empty file is equivalent to
//! the default configuration. `OUTLINE_DB_PATH`, `OUTLINE_LOG_LEVEL` and
//! `OUTLINE_LOG_DIR` override the file.

use crate::alloc::DEFAULT_ID_ATTEMPTS;
use crate::db::{ConnectionOptions, DEFAULT_BUSY_TIMEOUT};
use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE_NAME: &str = "outline.toml";
const DEFAULT_DB_FILE_NAME: &str = "outline.sqlite3";

pub const ENV_DB_PATH: &str = "OUTLINE_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "OUTLINE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "OUTLINE_LOG_DIR";

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    InvalidValue { key: &'static str, message: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::InvalidValue { key, message } => write!(f, "invalid `{key}`: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    pub busy_timeout_ms: u64,
    /// Random identifier candidates tried per insert.
    pub id_max_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE_NAME),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT.as_millis() as u64,
            id_max_attempts: DEFAULT_ID_ATTEMPTS,
        }
    }
}

impl StoreConfig {
    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }
}

/// Logging section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute directory for rolling log files. `None` disables file logs.
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl OutlineConfig {
    /// Parses and validates TOML text.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`; a missing file yields the default configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(source) => Self::from_toml_str(&source),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Applies `OUTLINE_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup(ENV_DB_PATH).filter(|value| !value.trim().is_empty()) {
            self.store.db_path = PathBuf::from(value.trim());
        }
        if let Some(value) = lookup(ENV_LOG_LEVEL).filter(|value| !value.trim().is_empty()) {
            self.logging.level = value.trim().to_string();
        }
        if let Some(value) = lookup(ENV_LOG_DIR) {
            let trimmed = value.trim();
            self.logging.log_dir = (!trimmed.is_empty()).then(|| PathBuf::from(trimmed));
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.store.db_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "store.db_path",
                message: "must not be empty".to_string(),
            });
        }
        if self.store.id_max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "store.id_max_attempts",
                message: "must be at least 1".to_string(),
            });
        }
        if let Some(log_dir) = &self.logging.log_dir {
            if !log_dir.is_absolute() {
                return Err(ConfigError::InvalidValue {
                    key: "logging.log_dir",
                    message: format!("must be absolute, got `{}`", log_dir.display()),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, OutlineConfig, ENV_DB_PATH, ENV_LOG_DIR};
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn empty_source_yields_defaults() {
        let config = OutlineConfig::from_toml_str("").unwrap();
        assert_eq!(config, OutlineConfig::default());
        assert_eq!(config.store.id_max_attempts, 8);
        assert_eq!(
            config.store.connection_options().busy_timeout,
            Duration::from_secs(5)
        );
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = OutlineConfig::from_toml_str(
            "[store]\nbusy_timeout_ms = 250\n\n[logging]\nlevel = \"warn\"\n",
        )
        .unwrap();
        assert_eq!(config.store.busy_timeout_ms, 250);
        assert_eq!(config.store.db_path, PathBuf::from("outline.sqlite3"));
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.log_dir, None);
    }

    #[test]
    fn zero_id_attempts_is_rejected() {
        let err = OutlineConfig::from_toml_str("[store]\nid_max_attempts = 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "store.id_max_attempts",
                ..
            }
        ));
    }

    #[test]
    fn overrides_replace_file_values() {
        let err = OutlineConfig::default()
            .with_overrides(|key| match key {
                ENV_DB_PATH => Some("/tmp/other.sqlite3".to_string()),
                ENV_LOG_DIR => Some("relative/logs".to_string()),
                _ => None,
            })
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "logging.log_dir",
                ..
            }
        ));

        let config = OutlineConfig::default()
            .with_overrides(|key| (key == ENV_DB_PATH).then(|| "/tmp/other.sqlite3".to_string()))
            .unwrap();
        assert_eq!(config.store.db_path, PathBuf::from("/tmp/other.sqlite3"));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = OutlineConfig::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, OutlineConfig::default());
    }
}
