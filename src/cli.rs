//! Command-line interface parsing for crestcheck
//!
//! This module handles parsing of CLI arguments using clap and turns them,
//! together with the settings file, into everything a run needs.

use clap::Parser;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

use crate::catalog::IndexKey;
use crate::config::{ConfigError, Settings};

/// Error types for CLI setup
#[derive(Debug, Error)]
pub enum CliError {
    /// Settings file could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// crestcheck - Validate EVE Online ids against CREST
#[derive(Parser, Debug)]
#[command(name = "crestcheck")]
#[command(about = "Validate EVE Online catalog ids against CREST, with a local cache")]
#[command(version)]
pub struct Cli {
    /// Endpoint to validate against
    ///
    /// Built in: inventory_types, map_regions
    #[arg(value_name = "ENDPOINT")]
    pub endpoint: String,

    /// Ids to validate; integers are looked up as numbers, anything else as text
    #[arg(value_name = "ID", required = true)]
    pub ids: Vec<String>,

    /// Settings file (YAML); defaults to config.yaml in the user config directory
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory for cache tables
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Skip the cache and always ask CREST
    #[arg(long)]
    pub no_cache: bool,

    /// Cache time-to-live in seconds
    #[arg(long, value_name = "SECS")]
    pub ttl: Option<u64>,

    /// CREST base address
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,
}

/// Everything derived from CLI arguments for one run
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub endpoint: String,
    pub ids: Vec<IndexKey>,
    pub cache_bypass: bool,
    pub settings: Settings,
}

impl RunConfig {
    /// Builds a RunConfig from parsed CLI arguments
    ///
    /// Settings come from `--config` if given (the file must exist), else
    /// from the default settings file if present, else built-in defaults.
    /// Flags override file values.
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let settings = match &cli.config {
            Some(path) => Settings::load(path)?,
            None => Settings::load_default()?,
        };
        Self::with_settings(cli, settings)
    }

    /// Same as `from_cli`, starting from the given settings
    pub fn with_settings(cli: &Cli, mut settings: Settings) -> Result<Self, CliError> {
        if let Some(dir) = &cli.cache_dir {
            settings.cache_dir = Some(dir.clone());
        }
        if let Some(ttl) = cli.ttl {
            settings.cache_ttl_secs = ttl;
        }
        if let Some(base_url) = &cli.base_url {
            settings.base_url = base_url.clone();
        }
        settings.validate()?;

        Ok(RunConfig {
            endpoint: cli.endpoint.clone(),
            ids: cli.ids.iter().map(|id| IndexKey::parse_arg(id)).collect(),
            cache_bypass: cli.no_cache,
            settings,
        })
    }
}

/// One line of output: the document found for an id
#[derive(Debug, Serialize)]
pub struct LookupOutput<'a> {
    pub endpoint: &'a str,
    pub id: &'a IndexKey,
    pub payload: &'a Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_cli_parse_endpoint_and_ids() {
        let cli = Cli::parse_from(["crestcheck", "inventory_types", "587", "34"]);
        assert_eq!(cli.endpoint, "inventory_types");
        assert_eq!(cli.ids, vec!["587", "34"]);
        assert!(!cli.no_cache);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_requires_an_id() {
        assert!(Cli::try_parse_from(["crestcheck", "inventory_types"]).is_err());
        assert!(Cli::try_parse_from(["crestcheck"]).is_err());
    }

    #[test]
    fn test_cli_parse_flags() {
        let cli = Cli::parse_from([
            "crestcheck",
            "--no-cache",
            "--ttl",
            "60",
            "--cache-dir",
            "/tmp/c",
            "--base-url",
            "http://localhost:1/",
            "map_regions",
            "10000002",
        ]);
        assert!(cli.no_cache);
        assert_eq!(cli.ttl, Some(60));
        assert_eq!(cli.cache_dir, Some(PathBuf::from("/tmp/c")));
        assert_eq!(cli.base_url.as_deref(), Some("http://localhost:1/"));
    }

    #[test]
    fn test_cli_rejects_non_numeric_ttl() {
        let result =
            Cli::try_parse_from(["crestcheck", "--ttl", "soon", "inventory_types", "587"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_run_config_overrides_settings() {
        let cli = Cli::parse_from([
            "crestcheck",
            "--no-cache",
            "--ttl",
            "60",
            "--cache-dir",
            "/tmp/c",
            "inventory_types",
            "587",
            "Tritanium",
        ]);
        let run = RunConfig::with_settings(&cli, Settings::default()).unwrap();

        assert_eq!(run.endpoint, "inventory_types");
        assert_eq!(
            run.ids,
            vec![IndexKey::Int(587), IndexKey::Str("Tritanium".to_string())]
        );
        assert!(run.cache_bypass);
        assert_eq!(run.settings.cache_ttl_secs, 60);
        assert_eq!(run.settings.cache_dir, Some(PathBuf::from("/tmp/c")));
    }

    #[test]
    fn test_run_config_rejects_empty_base_url() {
        let cli = Cli::parse_from(["crestcheck", "--base-url", "", "inventory_types", "587"]);
        let result = RunConfig::with_settings(&cli, Settings::default());
        assert!(matches!(
            result,
            Err(CliError::Config(ConfigError::Invalid(_)))
        ));
    }

    #[test]
    fn test_run_config_reads_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "user_agent: from-file\ncache_ttl_secs: 5\n").unwrap();

        let cli = Cli::parse_from([
            "crestcheck",
            "--config",
            path.to_str().unwrap(),
            "map_regions",
            "10000002",
        ]);
        let run = RunConfig::from_cli(&cli).unwrap();

        assert_eq!(run.settings.user_agent, "from-file");
        assert_eq!(run.settings.cache_ttl_secs, 5);
    }

    #[test]
    fn test_run_config_missing_config_file() {
        let cli = Cli::parse_from([
            "crestcheck",
            "--config",
            "/definitely/not/here.yaml",
            "map_regions",
            "10000002",
        ]);
        assert!(matches!(
            RunConfig::from_cli(&cli),
            Err(CliError::Config(ConfigError::NotFound(_)))
        ));
    }

    #[test]
    fn test_lookup_output_serialization() {
        let id = IndexKey::Int(587);
        let payload = serde_json::json!({"name": "Rifter"});
        let line = serde_json::to_string(&LookupOutput {
            endpoint: "inventory_types",
            id: &id,
            payload: &payload,
        })
        .unwrap();

        assert_eq!(
            line,
            r#"{"endpoint":"inventory_types","id":587,"payload":{"name":"Rifter"}}"#
        );
    }
}
