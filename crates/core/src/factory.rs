//! Agent Factories
//!
//! A factory builds an [`AgentDefinition`] and launches it through a
//! [`SessionManager`]. Two agents ship with the crate: a tool-less basic agent
//! and the book consultant, which answers from the vector store.

use crate::{
    agent::{AgentDefinition, Passage, ToolDefinition, ToolHandler, ToolOutput},
    search::{SearchClient, SearchOptions},
    session::{Session, SessionError, SessionManager, SessionOptions},
};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

pub const BASIC_AGENT_NAME: &str = "Simple Agent";
pub const BASIC_AGENT_INSTRUCTIONS: &str = "You are a simple agent that can answer questions and provide information based on the user's input. Keep your responses concise and relevant.";

pub const RAG_AGENT_NAME: &str = "Consultor de finanças - qualquer tipo de finanças";
pub const RAG_AGENT_INSTRUCTIONS: &str = include_str!("../prompts/rag_livre.md");

pub const SEARCH_TOOL_NAME: &str = "search_book_content";
pub const SEARCH_TOOL_DESCRIPTION: &str =
    "Busca informações no livro de Eric Chevru sobre finanças pessoais";
pub const NOT_FOUND_MESSAGE: &str =
    "Não foram encontradas informações relevantes sobre este tópico no livro.";
pub const SEARCH_FAILED_MESSAGE: &str =
    "Ocorreu um erro ao buscar informações no livro. Por favor, tente novamente.";

/// An agent definition paired with the session opened for it.
#[derive(Debug)]
pub struct LaunchedAgent {
    pub agent: Arc<AgentDefinition>,
    pub session: Session,
}

/// Builds an agent and opens a realtime session for it.
#[async_trait]
pub trait AgentFactory: Send + Sync {
    fn build(&self) -> AgentDefinition;

    fn session_manager(&self) -> &SessionManager;

    fn session_options(&self) -> &SessionOptions;

    /// Builds the agent and opens its session. Failures are logged and returned.
    async fn launch(&self) -> Result<LaunchedAgent, SessionError> {
        let agent = Arc::new(self.build());
        match self
            .session_manager()
            .open(agent.clone(), self.session_options())
            .await
        {
            Ok(session) => {
                info!(agent = %agent.name, tools = agent.tools.len(), "Agent launched");
                Ok(LaunchedAgent { agent, session })
            }
            Err(e) => {
                error!(agent = %agent.name, error = %e, "Failed to launch agent");
                Err(e)
            }
        }
    }
}

/// A general-purpose agent without tools.
pub struct BasicAgentFactory {
    sessions: SessionManager,
    options: SessionOptions,
}

impl BasicAgentFactory {
    pub fn new(sessions: SessionManager) -> Self {
        Self {
            sessions,
            options: SessionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }
}

impl AgentFactory for BasicAgentFactory {
    fn build(&self) -> AgentDefinition {
        AgentDefinition::new(BASIC_AGENT_NAME, BASIC_AGENT_INSTRUCTIONS)
    }

    fn session_manager(&self) -> &SessionManager {
        &self.sessions
    }

    fn session_options(&self) -> &SessionOptions {
        &self.options
    }
}

/// The personal-finance consultant that answers from Eric's book.
pub struct RagAgentFactory {
    sessions: SessionManager,
    search: Arc<SearchClient>,
    options: SessionOptions,
}

impl RagAgentFactory {
    pub fn new(sessions: SessionManager, search: Arc<SearchClient>) -> Self {
        Self {
            sessions,
            search,
            options: SessionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }
}

impl AgentFactory for RagAgentFactory {
    fn build(&self) -> AgentDefinition {
        AgentDefinition::new(RAG_AGENT_NAME, RAG_AGENT_INSTRUCTIONS)
            .with_tool(SearchBookTool::definition(self.search.clone()))
    }

    fn session_manager(&self) -> &SessionManager {
        &self.sessions
    }

    fn session_options(&self) -> &SessionOptions {
        &self.options
    }
}

/// Arguments of the `search_book_content` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchBookArgs {
    /// A consulta ou pergunta para buscar no livro
    pub query: String,
}

/// Tool handler that looks questions up in the book's vector store.
pub struct SearchBookTool {
    search: Arc<SearchClient>,
}

impl SearchBookTool {
    pub fn new(search: Arc<SearchClient>) -> Self {
        Self { search }
    }

    pub fn definition(search: Arc<SearchClient>) -> ToolDefinition {
        ToolDefinition::new(
            SEARCH_TOOL_NAME,
            SEARCH_TOOL_DESCRIPTION,
            parameters_schema(),
            Arc::new(Self::new(search)),
        )
    }

    async fn lookup(
        &self,
        arguments: Value,
    ) -> Result<ToolOutput, Box<dyn std::error::Error + Send + Sync>> {
        let args: SearchBookArgs = serde_json::from_value(arguments)?;
        let response = self
            .search
            .search(&args.query, &SearchOptions::default())
            .await?;

        if response.results.is_empty() {
            return Ok(ToolOutput::message(NOT_FOUND_MESSAGE));
        }

        Ok(ToolOutput::passages(
            response
                .results
                .into_iter()
                .map(|result| Passage {
                    text: result.text,
                    page: result.page,
                    relevance: result.score,
                })
                .collect(),
        ))
    }
}

#[async_trait]
impl ToolHandler for SearchBookTool {
    async fn call(&self, arguments: Value) -> ToolOutput {
        match self.lookup(arguments).await {
            Ok(output) => output,
            Err(e) => {
                error!(error = %e, "Failed to search the book");
                ToolOutput::message(SEARCH_FAILED_MESSAGE)
            }
        }
    }
}

fn parameters_schema() -> Value {
    let mut schema = schemars::schema_for!(SearchBookArgs);
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
    }
    schema.to_value()
}
