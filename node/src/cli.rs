//! # CLI Interface
//!
//! Defines the command-line argument structure for `gemledger-node` using
//! `clap` derive. Supports five subcommands: `run`, `init`, `invoke`,
//! `query`, and `version`.
//!
//! Every flag that maps onto a [`NodeConfig`] field is optional and only
//! overrides the configuration file when given.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::NodeConfig;

/// GemLedger asset ledger node.
///
/// Hosts the asset contract over a persistent world state, serves the
/// JSON-RPC and REST API, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "gemledger-node",
    about = "GemLedger asset ledger node",
    version,
    propagate_version = true
)]
pub struct GemLedgerCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the API and metrics endpoints.
    Run(RunArgs),
    /// Create the data directory, write a config file, and seed the ledger.
    Init(InitArgs),
    /// Submit one invocation and commit it.
    Invoke(InvokeArgs),
    /// Evaluate one invocation without committing anything.
    Query(InvokeArgs),
    /// Print version information and exit.
    Version,
}

/// Options shared by every subcommand that opens the ledger.
#[derive(Args, Debug, Clone, Default)]
pub struct NodeArgs {
    /// Path to the node configuration file (TOML).
    ///
    /// When omitted, `config.toml` in the data directory is used if present.
    #[arg(long, short = 'c', env = "GEMLEDGER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the database and config file.
    #[arg(long, short = 'd', env = "GEMLEDGER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Default log level when `RUST_LOG` is unset.
    #[arg(long, env = "GEMLEDGER_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log output format: `pretty` or `json`.
    #[arg(long, env = "GEMLEDGER_LOG_FORMAT")]
    pub log_format: Option<String>,

    /// Runs per submission before a commit conflict is reported.
    #[arg(long, env = "GEMLEDGER_MAX_ATTEMPTS")]
    pub max_attempts: Option<u32>,

    /// Owner credited with converted gem.
    #[arg(long, env = "GEMLEDGER_COLLECTOR")]
    pub collector: Option<String>,
}

impl NodeArgs {
    /// Load the configuration file and apply the flags given on top of it.
    pub fn resolve(&self) -> anyhow::Result<NodeConfig> {
        let mut config = NodeConfig::resolve(self.config.as_deref(), self.data_dir.as_deref())?;
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.log_format = format.clone();
        }
        if let Some(attempts) = self.max_attempts {
            config.max_attempts = attempts;
        }
        if let Some(collector) = &self.collector {
            config.collector = collector.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub node: NodeArgs,

    /// Port for the JSON-RPC and REST API.
    #[arg(long, env = "GEMLEDGER_RPC_PORT")]
    pub rpc_port: Option<u16>,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "GEMLEDGER_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

impl RunArgs {
    pub fn resolve(&self) -> anyhow::Result<NodeConfig> {
        let mut config = self.node.resolve()?;
        if let Some(port) = self.rpc_port {
            config.rpc_port = port;
        }
        if let Some(port) = self.metrics_port {
            config.metrics_port = port;
        }
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct InitArgs {
    #[command(flatten)]
    pub node: NodeArgs,

    /// Re-write the genesis records even if the ledger already has commits.
    #[arg(long)]
    pub reseed: bool,
}

#[derive(Args, Debug)]
pub struct InvokeArgs {
    #[command(flatten)]
    pub node: NodeArgs,

    /// Caller identity attached to the transaction.
    #[arg(long, env = "GEMLEDGER_IDENTITY")]
    pub identity: Option<String>,

    /// Contract function, e.g. `TransferAsset`.
    pub function: String,

    /// Positional string arguments for the function.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        GemLedgerCli::command().debug_assert();
    }

    #[test]
    fn invoke_collects_trailing_arguments() {
        let cli = GemLedgerCli::try_parse_from([
            "gemledger-node",
            "invoke",
            "--identity",
            "alice",
            "ConvertGemToExp",
            "Team2",
            "-3",
        ])
        .unwrap();
        match cli.command {
            Commands::Invoke(args) => {
                assert_eq!(args.identity.as_deref(), Some("alice"));
                assert_eq!(args.function, "ConvertGemToExp");
                assert_eq!(args.args, ["Team2", "-3"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "rpc_port = 7000\ncollector = \"Treasury\"\n",
        )
        .unwrap();

        let cli = GemLedgerCli::try_parse_from([
            "gemledger-node",
            "run",
            "--data-dir",
            dir.path().to_str().unwrap(),
            "--metrics-port",
            "7001",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.rpc_port, 7000);
        assert_eq!(config.metrics_port, 7001);
        assert_eq!(config.collector, "Treasury");
        assert_eq!(config.data_dir, dir.path());
    }
}
