mod block_listener;
mod chain;
mod config;
mod contract;
mod event_listener;
mod logging;
mod monitor;
mod price;
#[cfg(test)]
mod testing;
mod web3_client;

use anyhow::{Context, Result};
use clap::Parser;
use config::FeedConfig;
use dotenv::dotenv;
use monitor::Monitor;
use std::sync::Arc;
use tracing::info;
use web3_client::{Bounded, Web3Client};

/// Logs new blocks and price feed updates from an Ethereum node.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Feed config file (defaults to FEED_CONFIG or feed.yaml)
    #[arg(short, long)]
    config: Option<String>,

    /// WebSocket node endpoint (defaults to NODE_URL or ALCHEMY_URL)
    #[arg(long)]
    node_url: Option<String>,

    /// Emit one JSON object per log line
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let args = Args::parse();
    logging::init(args.json_logs)?;

    let config =
        FeedConfig::load(args.config.as_deref()).context("failed parsing feed config")?;
    let node_url = config::node_url(args.node_url)?;
    let timeout = config.query_timeout();

    let client = Web3Client::connect(&node_url, timeout)
        .await
        .context("startup aborted")?;

    info!(feeds = config.feeds.len(), "Starting monitor");
    let report = Monitor::new(Arc::new(Bounded::new(client, timeout)), config.feeds)
        .start()
        .await;
    info!(
        terminated = report.terminated(),
        failed = report.failed,
        "Monitor stopped"
    );

    Ok(())
}
