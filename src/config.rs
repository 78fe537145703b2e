// SPDX-License-Identifier: GPL-3.0-only

use crate::constants::{DEFAULT_AUTH_URL, DEFAULT_QUERY_URL, DEFAULT_REQUEST_TIMEOUT, JpegQuality};
use crate::errors::ConfigError;
use crate::pipelines::localization::{MapSelector, MapType};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Directory name under the user config dir
const APP_DIR: &str = "vps-relocalizer";
const CONFIG_FILE: &str = "config.json";

/// Environment variables that override file values
pub mod env {
    pub const CLIENT_ID: &str = "VPS_CLIENT_ID";
    pub const CLIENT_SECRET: &str = "VPS_CLIENT_SECRET";
    pub const MAP_CODE: &str = "VPS_MAP_CODE";
    pub const MAP_SET_CODE: &str = "VPS_MAP_SET_CODE";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Token endpoint
    pub auth_url: String,
    /// Localization query endpoint
    pub query_url: String,
    /// Client id for the token exchange
    pub client_id: String,
    /// Client secret for the token exchange
    pub client_secret: String,
    /// Code of a single map
    pub map_code: String,
    /// Code of a map set
    pub map_set_code: String,
    /// Which of the two codes is used
    pub map_type: MapType,
    /// JPEG quality of the query image
    pub jpeg_quality: JpegQuality,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth_url: DEFAULT_AUTH_URL.to_string(),
            query_url: DEFAULT_QUERY_URL.to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            map_code: String::new(),
            map_set_code: String::new(),
            map_type: MapType::default(),
            jpeg_quality: JpegQuality::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

impl Config {
    /// Default config file location
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from the default location and apply environment overrides
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            Some(path) => {
                debug!(path = %path.display(), "No config file, using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Save to the default location
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path()
            .ok_or_else(|| ConfigError::Io("no config directory on this system".to_string()))?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        info!(path = %path.display(), "Saved config");
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Override fields from a key lookup; empty values are ignored
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let fields = [
            (env::CLIENT_ID, &mut self.client_id),
            (env::CLIENT_SECRET, &mut self.client_secret),
            (env::MAP_CODE, &mut self.map_code),
            (env::MAP_SET_CODE, &mut self.map_set_code),
        ];

        for (key, field) in fields {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                debug!(key, "Config value overridden from environment");
                *field = value;
            }
        }
    }

    /// Map selection for the configured map type
    pub fn map_selector(&self) -> Result<MapSelector, ConfigError> {
        let selector = match self.map_type {
            MapType::Map => MapSelector::Map(self.map_code.trim().to_string()),
            MapType::MapSet => MapSelector::MapSet(self.map_set_code.trim().to_string()),
        };
        selector.validate()?;
        Ok(selector)
    }

    /// Client id and secret, both required
    pub fn credentials(&self) -> Result<(&str, &str), ConfigError> {
        if self.client_id.trim().is_empty() || self.client_secret.trim().is_empty() {
            return Err(ConfigError::MissingCredentials);
        }
        Ok((&self.client_id, &self.client_secret))
    }

    /// Both endpoints must be http(s) URLs
    pub fn validate_endpoints(&self) -> Result<(), ConfigError> {
        for url in [&self.auth_url, &self.query_url] {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(ConfigError::InvalidEndpoint(url.clone()));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
