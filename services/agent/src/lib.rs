//! Mago Agent Service Library Crate
//!
//! Configuration and wiring for the `agent` binary: it turns a [`Config`] into a
//! [`SessionManager`] backed by the hosted credential backend and the OpenAI
//! Realtime connector, and picks the agent factory to launch.

pub mod config;

use anyhow::Context;
use clap::ValueEnum;
use config::Config;
use mago_core::{
    AgentFactory, BackendCredentialProvider, BasicAgentFactory, RagAgentFactory, SearchClient,
    SessionManager, SessionOptions,
};
use openai_realtime::OpenAIRealtimeConnector;
use std::sync::Arc;

/// The agents this service can launch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum AgentKind {
    /// General-purpose agent without tools.
    Basic,
    /// Personal-finance consultant backed by the book's vector store.
    Rag,
}

/// Builds the session manager described by `config`.
pub fn session_manager(config: &Config) -> anyhow::Result<SessionManager> {
    let credentials =
        BackendCredentialProvider::new(config.backend_url.clone(), config.request_timeout)
            .context("Failed to build credential client")?;
    let connector = OpenAIRealtimeConnector::new(config.realtime_url.clone());

    Ok(
        SessionManager::new(Arc::new(credentials), Arc::new(connector))
            .with_default_model(config.realtime_model.clone())
            .with_timeout(config.request_timeout),
    )
}

/// Builds the factory for `kind`.
pub fn agent_factory(
    kind: AgentKind,
    config: &Config,
    sessions: SessionManager,
    options: SessionOptions,
) -> anyhow::Result<Box<dyn AgentFactory>> {
    Ok(match kind {
        AgentKind::Basic => Box::new(BasicAgentFactory::new(sessions).with_options(options)),
        AgentKind::Rag => {
            let search = SearchClient::new(config.search_url.clone(), config.request_timeout)
                .context("Failed to build search client")?;
            Box::new(RagAgentFactory::new(sessions, Arc::new(search)).with_options(options))
        }
    })
}
