//! Runtime configuration loaded from an optional YAML file.
//!
//! Every key is optional; anything missing falls back to the defaults the
//! crawler has always used (`web/files` for per-page artifacts, `dist` for
//! merged editions, a five second settle delay around the merge).
//!
//! ```yaml
//! output_dir: web/files
//! merged_root: dist
//! settle_delay_secs: 5
//! http:
//!   request_timeout_secs: 60
//!   connect_timeout_secs: 10
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, instrument};

use crate::error::ConfigError;

/// Top-level configuration for a harvesting invocation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory for per-page artifacts and image scratch files.
    pub output_dir: PathBuf,
    /// Root under which dated merge directories are created.
    pub merged_root: PathBuf,
    /// Pause before and after the merge step, in seconds.
    pub settle_delay_secs: u64,
    /// HTTP client settings.
    pub http: HttpSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("web/files"),
            merged_root: PathBuf::from("dist"),
            settle_delay_secs: 5,
            http: HttpSettings::default(),
        }
    }
}

impl Config {
    /// Load the configuration from `path`, or return the defaults when no
    /// path is given.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }
}

/// Timeouts and identification for the shared HTTP client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60,
            connect_timeout_secs: 10,
            user_agent: concat!("daily_papers/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
