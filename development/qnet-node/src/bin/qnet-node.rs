//! QNet node entry point: loads configuration, wires the composition
//! root, and runs the microblock/macroblock production loop until
//! shutdown.

use std::env;
use std::fs;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use qnet_core::envelope::{SignatureAlgorithm, VerifierRegistry};
use qnet_node::{InMemoryStore, NodeConfig, NodeEvent, QNetNode};
use tokio::time::{interval, Duration};
use tracing_subscriber::EnvFilter;

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}

fn load_config() -> Result<NodeConfig> {
    match env::var("QNET_CONFIG_PATH") {
        Ok(path) => {
            let bytes = fs::read(&path).with_context(|| format!("reading config at {path}"))?;
            NodeConfig::from_json(&bytes).with_context(|| format!("parsing config at {path}"))
        }
        Err(_) => {
            tracing::warn!("QNET_CONFIG_PATH not set, using built-in defaults");
            Ok(NodeConfig::default())
        }
    }
}

async fn run_event_logger(mut subscriber: qnet_node::EventSubscriber) {
    while let Some(event) = subscriber.recv().await {
        match event {
            NodeEvent::BanRequested(request) => tracing::warn!(?request, "ban requested"),
            other => tracing::info!(?other, "node event"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config()?;
    let genesis_unix = config.phase.phase1_launch_unix;

    let node = Arc::new(QNetNode::new(
        config.clone(),
        InMemoryStore::new(),
        VerifierRegistry::new(),
        SignatureAlgorithm::LatticeL3,
        genesis_unix,
    ));

    if let Some(subscriber) = node.subscribe() {
        tokio::spawn(run_event_logger(subscriber));
    }

    node.mark_started()?;
    tracing::info!("qnet node started");

    let mut microblock_tick = interval(Duration::from_secs(config.pipeline.microblock_interval_seconds));
    let mut shutdown = Box::pin(tokio::signal::ctrl_c());

    loop {
        tokio::select! {
            _ = microblock_tick.tick() => {
                let now = now_unix();
                match node.pipeline.produce_microblock("local-leader".to_string(), now) {
                    Ok(block) => tracing::debug!(height = block.height, "tick"),
                    Err(err) => tracing::error!(%err, "microblock production failed"),
                }
            }
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }

    node.mark_stopped()?;
    Ok(())
}
