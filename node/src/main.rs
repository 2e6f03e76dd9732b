// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # GemLedger Node
//!
//! Entry point for the `gemledger-node` binary. Parses CLI arguments,
//! resolves configuration, initializes logging and metrics, opens the sled
//! world state, and hosts the asset contract.
//!
//! The binary supports five subcommands:
//!
//! - `run`: serve the JSON-RPC/REST API and the metrics endpoint
//! - `init`: create the data directory and config file, seed the ledger
//! - `invoke`: submit one invocation and print its receipt
//! - `query`: evaluate one invocation and print its payload
//! - `version`: print build version information

mod api;
mod cli;
mod config;
mod logging;
mod metrics;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;

use gemledger_contracts::{AssetContract, ContractHost, Invocation};
use gemledger_protocol::{LedgerDb, WorldState};

use cli::{Commands, GemLedgerCli};
use config::NodeConfig;
use logging::LogFormat;
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = GemLedgerCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args.resolve()?).await,
        Commands::Init(args) => init_node(args.node.resolve()?, args.reseed),
        Commands::Invoke(args) => invoke(args, true),
        Commands::Query(args) => invoke(args, false),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn start_logging(config: &NodeConfig) -> Result<()> {
    logging::init_logging(&config.log_level, LogFormat::from_str_lossy(&config.log_format))
}

/// Opens the sled database under the configured data directory and wraps
/// it in a contract host.
fn open_ledger(config: &NodeConfig) -> Result<(Arc<LedgerDb>, ContractHost)> {
    let db_path = config.db_path();
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;

    let db = Arc::new(
        LedgerDb::open(&db_path)
            .with_context(|| format!("failed to open database at {}", db_path.display()))?,
    );
    tracing::info!(path = %db_path.display(), keys = db.len(), "database opened");

    let contract = AssetContract::with_collector(config.collector.clone());
    let host = ContractHost::new(db.clone(), contract).with_max_attempts(config.max_attempts);
    Ok((db, host))
}

/// Serves the API and metrics endpoints until a shutdown signal arrives.
async fn run_node(config: NodeConfig) -> Result<()> {
    start_logging(&config)?;

    tracing::info!(
        rpc_port = config.rpc_port,
        metrics_port = config.metrics_port,
        data_dir = %config.data_dir.display(),
        collector = %config.collector,
        max_attempts = config.max_attempts,
        "starting gemledger-node"
    );

    let (db, host) = open_ledger(&config)?;
    let version = host.last_version().context("failed to read last commit version")?;
    if version == 0 {
        tracing::warn!("ledger has no commits; run `gemledger-node init` to seed it");
    }

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);
    node_metrics.set_version(version);

    // --- Application state ---
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            gemledger_protocol::config::PROTOCOL_VERSION,
        ),
        host: Arc::new(host),
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", config.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("RPC/API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", config.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    db.flush().context("failed to flush database")?;
    tracing::info!("gemledger-node stopped");
    Ok(())
}

/// Creates the data directory, writes a config file if none exists, and
/// seeds the genesis records.
fn init_node(config: NodeConfig, reseed: bool) -> Result<()> {
    start_logging(&config)?;

    let data_dir = &config.data_dir;
    tracing::info!(data_dir = %data_dir.display(), "initializing node");
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let config_path = config.config_path();
    if !config_path.exists() {
        std::fs::write(&config_path, config.to_toml()?)
            .with_context(|| format!("failed to write config to {}", config_path.display()))?;
        tracing::info!(path = %config_path.display(), "config written");
    }

    let (db, host) = open_ledger(&config)?;
    let previous = host.last_version()?;
    let seeded = if previous == 0 || reseed {
        let receipt = host
            .submit(&Invocation::new("InitLedger", Vec::<String>::new()), None)
            .context("failed to seed the ledger")?;
        Some(receipt.version)
    } else {
        tracing::info!(version = previous, "ledger already has commits; skipping seed");
        None
    };
    db.flush().context("failed to flush database")?;

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Config file    : {}", config_path.display());
    println!("  Collector      : {}", config.collector);
    match seeded {
        Some(version) => println!("  Genesis seeded : version {}", version),
        None => println!("  Genesis seeded : skipped (version {})", previous),
    }

    Ok(())
}

/// Runs one invocation from the command line. `commit` selects submit over
/// evaluate. The result is printed as JSON on stdout.
fn invoke(args: cli::InvokeArgs, commit: bool) -> Result<()> {
    let config = args.node.resolve()?;
    start_logging(&config)?;

    let (db, host) = open_ledger(&config)?;
    let invocation = Invocation::new(args.function, args.args);
    let identity = args.identity.as_deref();

    let output = if commit {
        let receipt = host
            .submit(&invocation, identity)
            .with_context(|| format!("{} failed", invocation.function))?;
        db.flush().context("failed to flush database")?;
        serde_json::to_string_pretty(&receipt)?
    } else {
        let payload = host
            .evaluate(&invocation, identity)
            .with_context(|| format!("{} failed", invocation.function))?;
        serde_json::to_string_pretty(&payload)?
    };
    println!("{}", output);
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("gemledger-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol       {}", gemledger_protocol::config::PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. A handler that cannot
/// be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
