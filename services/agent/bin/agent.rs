//! Main Entrypoint for the Mago Agent Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing logging.
//! 3. Launching the selected agent with a fresh ephemeral session.
//! 4. Closing the session on shutdown.

use anyhow::Context;
use clap::Parser;
use mago_agent::{AgentKind, agent_factory, config::Config, session_manager};
use mago_core::SessionOptions;
use tracing::info;

/// Launch a realtime agent session.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Which agent to launch.
    #[arg(long, value_enum, default_value_t = AgentKind::Rag)]
    agent: AgentKind,
    /// Realtime model to use instead of the configured default.
    #[arg(long)]
    model: Option<String>,
}

/// Listens for the `Ctrl+C` signal to end the session.
async fn shutdown_signal() -> anyhow::Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to install Ctrl+C handler")?;
    info!("Received shutdown signal. Closing session...");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!(agent = ?args.agent, "Configuration loaded. Launching agent...");

    // --- 3. Launch Agent ---
    let sessions = session_manager(&config)?;
    let factory = agent_factory(
        args.agent,
        &config,
        sessions.clone(),
        SessionOptions { model: args.model },
    )?;
    let launched = factory.launch().await.context("Failed to launch agent")?;
    info!(
        agent = %launched.agent.name,
        model = %launched.session.model(),
        tools = launched.agent.tools.len(),
        "Agent started successfully"
    );

    // --- 4. Wait and Close ---
    let signal = shutdown_signal().await;
    sessions.close(Some(&launched.session)).await;
    info!("Agent session has shut down.");
    signal
}
