//! `gridmate-server`: serves the network tool catalogue over stdin/stdout.
//!
//! stdout carries protocol lines only; logs go to stderr.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use gridmate_server::{load_config, Server, Session};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Power-grid network tool server (JSON-RPC over stdio)", long_about = None)]
struct Opt {
    /// Configuration file (default: ~/.gridmate/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Log level filter, overrides the configured level
    #[arg(long)]
    log_level: Option<String>,
    /// Network file to load before serving
    #[arg(long)]
    network: Option<PathBuf>,
}

fn main() {
    if let Err(err) = run() {
        error!("{err:#}");
        eprintln!("gridmate-server: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let opt = Opt::parse();
    let config = load_config(opt.config.as_deref())?;

    let level = opt.log_level.as_deref().unwrap_or(&config.logging.level);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level '{level}'"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    info!("gridmate-server v{}", env!("CARGO_PKG_VERSION"));

    let mut session = Session::new(config);
    if let Some(path) = &opt.network {
        let outcome = session
            .load_network(path)
            .with_context(|| format!("failed to preload {}", path.display()))?;
        info!(counts = %outcome.summary.counts, "preloaded network");
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    Server::new(session).serve(stdin.lock(), stdout.lock())
}
