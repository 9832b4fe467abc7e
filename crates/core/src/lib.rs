//! Mago Core
//!
//! Bootstrap for realtime conversational agents: ephemeral credentials, agent
//! and tool definitions, session lifecycle, and the vector-search client that
//! backs the book consultant's retrieval tool.

pub mod agent;
pub mod credential;
pub mod factory;
pub mod realtime;
pub mod search;
pub mod session;

#[cfg(test)]
mod testing;

pub use agent::{AgentDefinition, ToolDefinition, ToolHandler, ToolOutput};
pub use credential::{BackendCredentialProvider, Credential, CredentialError, CredentialProvider};
pub use factory::{AgentFactory, BasicAgentFactory, LaunchedAgent, RagAgentFactory};
pub use realtime::{RealtimeConnector, RealtimeError, RealtimeSession, SessionConfig, Teardown};
pub use search::{SearchClient, SearchError, SearchOptions, SearchResponse};
pub use session::{Session, SessionError, SessionManager, SessionOptions};
