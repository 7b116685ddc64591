//! Process entry point: resolves [`OrchestratorConfig`], wires the bus,
//! store, and MCP adapters into a [`Context`], starts the response and ping
//! loops, then serves the HTTP/SSE adapter (§5, §6).

use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;

use orchestrator_config::OrchestratorConfig;
use orchestrator_core::{
    Context, ContextConfig, PersonaConfig, RedisBus, RmcpAdapter,
};
use orchestrator_store::RedisStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    orchestrator_config::load_and_apply("orchestrator", None::<&std::path::Path>).ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = OrchestratorConfig::parse();

    let bus = RedisBus::connect(&config.bus_url, config.jobs_stream.clone()).await?;
    let store = RedisStore::connect(config.store_url()).await?;
    let mcp = RmcpAdapter::spawn(&config.mcp_command, &config.mcp_args).await?;

    let ctx = Context::new(Arc::new(bus), Arc::new(store), Arc::new(mcp)).with_config(ContextConfig {
        responses_topic: config.responses_topic.clone(),
        step_timeout: config.step_timeout,
        ping_interval: config.ping_interval,
    });

    let (tx, rx) = mpsc::channel(64);
    let responses_topic = config.responses_topic.clone();
    let bus_for_responses = ctx.bus.clone();
    tokio::spawn(async move {
        if let Err(err) = bus_for_responses.subscribe_responses(&responses_topic, tx).await {
            tracing::error!(error = %err, "response subscription ended");
        }
    });
    tokio::spawn(orchestrator_core::run_response_loop(ctx.clone(), rx));
    tokio::spawn(orchestrator_core::run_ping_loop(ctx.clone()));

    info!(addr = %config.http_addr, "starting orchestrator");
    orchestrator_serve::run_serve(ctx, PersonaConfig::default(), &config.http_addr).await
}
