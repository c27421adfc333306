//! Settings for the validation pipeline
//!
//! Settings are read from a YAML file by the binary and handed to
//! `Validator::new`; the core itself never looks at files or globals.
//! Every field has a default, so an empty file is a valid configuration.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::cache::FreshnessPolicy;

/// Public CREST address
pub const DEFAULT_BASE_URL: &str = "https://crest-tq.eveonline.com/";

/// User agent sent with every request
pub const DEFAULT_USER_AGENT: &str = "lockefox https://github.com/EVEprosper/ProsperAPI";

/// Shorter user agent for places with length limits
pub const DEFAULT_USER_AGENT_SHORT: &str = "lockefox @EVEProsper test";

/// Cached lookups are served for one day
pub const DEFAULT_CACHE_TTL_SECS: u64 = 86_400;

/// Errors that can occur when loading settings
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Explicitly requested settings file does not exist
    #[error("Settings file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Settings file could not be read
    #[error("Failed to read settings file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings file is not valid YAML for `Settings`
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A value is present but unusable
    #[error("Invalid settings: {0}")]
    Invalid(String),
}

/// Configuration consumed by the validator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Address every resource template is appended to
    pub base_url: String,
    /// Sent as `User-Agent` on catalog requests
    pub user_agent: String,
    /// Short form of the user agent
    pub user_agent_short: String,
    /// How long a cached lookup stays fresh
    pub cache_ttl_secs: u64,
    /// Where cache tables live; XDG cache directory when unset
    pub cache_dir: Option<PathBuf>,
    /// Upper bound on a single HTTP request
    pub request_timeout_secs: Option<u64>,
    /// Address template per endpoint name
    pub resources: HashMap<String, String>,
    /// Extra endpoint-to-parameter rows for the resolver
    pub parameters: HashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            user_agent_short: DEFAULT_USER_AGENT_SHORT.to_string(),
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            cache_dir: None,
            request_timeout_secs: None,
            resources: default_resources(),
            parameters: HashMap::new(),
        }
    }
}

fn default_resources() -> HashMap<String, String> {
    HashMap::from([
        (
            "inventory_types".to_string(),
            "inventory/types/{type_id}/".to_string(),
        ),
        ("map_regions".to_string(), "regions/{region_id}/".to_string()),
    ])
}

impl Settings {
    /// Parses settings from a YAML document and validates them
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        // an empty document deserializes to unit, not to an empty mapping
        let settings: Settings = if content.trim().is_empty() {
            Settings::default()
        } else {
            serde_yaml::from_str(content)?
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from `path`, which must exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::from_yaml(&content)
    }

    /// Loads settings from the default location, falling back to defaults
    /// when no file has been written there
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => match Self::load(&path) {
                Err(ConfigError::NotFound(_)) => Ok(Self::default()),
                other => other,
            },
            None => Ok(Self::default()),
        }
    }

    /// `config.yaml` in the XDG config directory (`~/.config/crestcheck/` on Linux)
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "crestcheck").map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Checks values serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url must not be empty".to_string()));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "user_agent must not be empty".to_string(),
            ));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Freshness policy built from `cache_ttl_secs`
    pub fn freshness(&self) -> FreshnessPolicy {
        FreshnessPolicy::from_secs(self.cache_ttl_secs)
    }
}
