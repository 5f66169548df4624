//! Configuration management for the CLI
//!
//! Layered lowest to highest: `~/.config/kusage/config.json`, `KUSAGE_*`
//! environment variables, then command-line flags.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use usage_lib::SourceConfig;

const ENV_PREFIX: &str = "KUSAGE";

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// `http(s)://...` URL or `namespace/service:port`
    pub prometheus_endpoint: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Namespace used by `pods` when none is given
    pub default_namespace: Option<String>,
}

impl Config {
    /// Load configuration from the default file and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path().ok().as_deref())
    }

    /// Load configuration from `path` (if it exists) and the environment
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Json)
                    .required(false),
            );
        }

        builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Merge flag values over this configuration
    pub fn source_config(&self, endpoint: Option<String>, timeout_secs: Option<u64>) -> SourceConfig {
        let defaults = SourceConfig::default();
        SourceConfig {
            endpoint: endpoint
                .or_else(|| self.prometheus_endpoint.clone())
                .filter(|e| !e.is_empty()),
            request_timeout_secs: timeout_secs
                .or(self.timeout_secs)
                .unwrap_or(defaults.request_timeout_secs),
        }
    }

    /// Get the configuration file path
    fn config_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("kusage").join("config.json"))
    }
}

/// Kubeconfig files named by `--kubeconfig` or `KUBECONFIG`, in merge order
pub fn kubeconfig_paths(value: &str) -> Vec<PathBuf> {
    std::env::split_paths(value)
        .filter(|p| !p.as_os_str().is_empty())
        .collect()
}
