//! Configuration loading
//!
//! Looks for a YAML file in this order:
//! 1. `--config <path>`
//! 2. `CONVERGE_CONFIG` environment variable
//! 3. `./converge.yaml`, then `./.converge/config.yaml`
//! 4. `~/.config/converge/config.yaml`
//!
//! No file at all means built-in defaults; the API URL and token can then come
//! from `CONVERGE_API_URL` / `CONVERGE_API_TOKEN`.

use converge_cloud::{KindProfile, PollTiming, ResourceKind};
use converge_cloud_http::HttpConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_ENV: &str = "CONVERGE_CONFIG";
pub const API_URL_ENV: &str = "CONVERGE_API_URL";
pub const API_TOKEN_ENV: &str = "CONVERGE_API_TOKEN";

const LOCAL_CANDIDATES: [&str; 2] = ["converge.yaml", ".converge/config.yaml"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error(
        "API URL is not configured. Set api.base_url in the config file \
        or the CONVERGE_API_URL environment variable"
    )]
    MissingApiUrl,

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Contents of the config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// REST API connection
    #[serde(default)]
    pub api: Option<HttpConfig>,

    /// Per-kind overrides
    #[serde(default)]
    pub kinds: HashMap<ResourceKind, KindOverrides>,
}

/// Overrides for one resource kind; absent fields keep the defaults
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KindOverrides {
    pub active_statuses: Option<Vec<String>>,
    pub deleting_statuses: Option<Vec<String>>,
    pub create: Option<PollTiming>,
    pub update: Option<PollTiming>,
    pub delete: Option<PollTiming>,
}

impl Config {
    /// Find and parse the config file, or fall back to defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match find_config_file(explicit)? {
            Some(path) => Self::from_file(&path),
            None => {
                tracing::debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// API connection settings with environment overrides applied
    pub fn http_config(&self) -> Result<HttpConfig> {
        let env_url = std::env::var(API_URL_ENV).ok().filter(|v| !v.is_empty());
        let mut api = match (&self.api, env_url) {
            (_, Some(url)) => {
                let mut api = self.api.clone().unwrap_or_else(|| HttpConfig::new(&url));
                api.base_url = url;
                api
            }
            (Some(api), None) => api.clone(),
            (None, None) => return Err(ConfigError::MissingApiUrl),
        };

        if let Ok(token) = std::env::var(API_TOKEN_ENV) {
            if !token.is_empty() {
                api.token = Some(token);
            }
        }
        Ok(api)
    }

    /// Reconciliation profile for a kind with overrides applied
    pub fn profile(&self, kind: ResourceKind) -> KindProfile {
        let mut profile = KindProfile::for_kind(kind);
        let Some(overrides) = self.kinds.get(&kind) else {
            return profile;
        };

        if let Some(statuses) = &overrides.active_statuses {
            profile.active_statuses = statuses.clone();
        }
        if let Some(statuses) = &overrides.deleting_statuses {
            profile.deleting_statuses = statuses.clone();
        }
        if let Some(timing) = overrides.create {
            profile.create = timing;
        }
        if let Some(timing) = overrides.update {
            profile.update = timing;
        }
        if let Some(timing) = overrides.delete {
            profile.delete = timing;
        }
        profile
    }
}

/// Locate the config file; `Ok(None)` when there is none
pub fn find_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        return if path.exists() {
            Ok(Some(path.to_path_buf()))
        } else {
            Err(ConfigError::NotFound(path.to_path_buf()))
        };
    }

    if let Ok(path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(path);
        return if path.exists() {
            Ok(Some(path))
        } else {
            Err(ConfigError::NotFound(path))
        };
    }

    let current_dir = std::env::current_dir()?;
    for candidate in LOCAL_CANDIDATES {
        let path = current_dir.join(candidate);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("converge").join("config.yaml");
        if global.exists() {
            return Ok(Some(global));
        }
    }

    Ok(None)
}
