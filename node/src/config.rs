//! # Node Configuration
//!
//! `NodeConfig` is read from an optional TOML file and then overridden by
//! command-line flags (which themselves fall back to `GEMLEDGER_*`
//! environment variables). Missing file fields take their defaults.
//!
//! ```toml
//! data_dir = ".gemledger"
//! rpc_port = 9841
//! metrics_port = 9842
//! log_level = "info"
//! log_format = "pretty"
//! max_attempts = 5
//! collector = "Distrib"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use gemledger_protocol::config::{
    ASSET_NAMESPACE, DEFAULT_COLLECTOR, DEFAULT_MAX_ATTEMPTS, DEFAULT_METRICS_PORT,
    DEFAULT_RPC_PORT, KIND_GEM,
};
use gemledger_protocol::storage::create_composite_key;

/// File name looked up inside the data directory when no explicit
/// `--config` is given.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Sub-directory of the data directory holding the sled database.
const DB_DIR_NAME: &str = "db";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub data_dir: PathBuf,
    pub rpc_port: u16,
    pub metrics_port: u16,
    /// Default tracing level; `RUST_LOG` takes precedence when set.
    pub log_level: String,
    /// `pretty` or `json`.
    pub log_format: String,
    /// Runs per submission before a commit conflict is returned.
    pub max_attempts: u32,
    /// Owner credited with converted gem.
    pub collector: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".gemledger"),
            rpc_port: DEFAULT_RPC_PORT,
            metrics_port: DEFAULT_METRICS_PORT,
            log_level: "info".into(),
            log_format: "pretty".into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            collector: DEFAULT_COLLECTOR.into(),
        }
    }
}

impl NodeConfig {
    /// Parse a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: NodeConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Resolve the effective file configuration.
    ///
    /// An explicit `path` must exist. Otherwise `<data_dir>/config.toml` is
    /// used when present, and the defaults when not.
    pub fn resolve(path: Option<&Path>, data_dir: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        let defaults = Self::default();
        let candidate = data_dir.unwrap_or(&defaults.data_dir).join(CONFIG_FILE_NAME);
        if candidate.exists() {
            Self::load(&candidate)
        } else {
            Ok(defaults)
        }
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.max_attempts > 0, "max_attempts must be at least 1");
        // The collector must be usable as the owner of a gem record.
        create_composite_key(ASSET_NAMESPACE, &[KIND_GEM, &self.collector])
            .with_context(|| format!("invalid collector {:?}", self.collector))?;
        anyhow::ensure!(
            matches!(self.log_format.to_lowercase().as_str(), "pretty" | "json"),
            "log_format must be \"pretty\" or \"json\", got {:?}",
            self.log_format
        );
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_DIR_NAME)
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        assert_eq!(NodeConfig::from_toml("").unwrap(), NodeConfig::default());
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let config = NodeConfig::from_toml("rpc_port = 7000\ncollector = \"Treasury\"\n").unwrap();
        assert_eq!(config.rpc_port, 7000);
        assert_eq!(config.collector, "Treasury");
        assert_eq!(config.metrics_port, DEFAULT_METRICS_PORT);
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(NodeConfig::from_toml("max_attempts = 0").is_err());
        assert!(NodeConfig::from_toml("collector = \"\"").is_err());
        assert!(NodeConfig::from_toml("collector = \"a\\u0000b\"").is_err());
        assert!(NodeConfig::from_toml("collector = \"Treasury\\U0010FFFF\"").is_err());
        assert!(NodeConfig::from_toml("collector = \"Treasury\"").is_ok());
        assert!(NodeConfig::from_toml("log_format = \"xml\"").is_err());
        assert!(NodeConfig::from_toml("rpc_port = \"high\"").is_err());
    }

    #[test]
    fn written_file_is_found_in_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig {
            data_dir: dir.path().to_path_buf(),
            log_format: "json".into(),
            ..NodeConfig::default()
        };
        std::fs::write(config.config_path(), config.to_toml().unwrap()).unwrap();

        let resolved = NodeConfig::resolve(None, Some(dir.path())).unwrap();
        assert_eq!(resolved, config);
        assert_eq!(resolved.db_path(), dir.path().join("db"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(NodeConfig::resolve(Some(&missing), None).is_err());
        // Without an explicit path a missing file falls back to defaults.
        let fallback = NodeConfig::resolve(None, Some(dir.path())).unwrap();
        assert_eq!(fallback.rpc_port, DEFAULT_RPC_PORT);
    }
}
