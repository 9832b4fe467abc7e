//! Realtime SDK Boundary
//!
//! The realtime conversational backend is an external collaborator. These traits
//! are the only surface the rest of the crate depends on, so a concrete
//! transport (see the `openai-realtime` crate) or a test double can be injected.

use crate::{agent::AgentDefinition, credential::Credential};
use async_trait::async_trait;
use std::{fmt, sync::Arc};

/// The ways a live session can be shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Teardown {
    Disconnect,
    Close,
    Stop,
    /// Partial cleanup: silences audio without releasing the connection.
    StopAudio,
}

impl fmt::Display for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Teardown::Disconnect => "disconnect",
            Teardown::Close => "close",
            Teardown::Stop => "stop",
            Teardown::StopAudio => "stop_audio",
        };
        f.write_str(name)
    }
}

/// Full shutdown methods, most preferred first.
pub const TEARDOWN_PRIORITY: [Teardown; 3] = [Teardown::Disconnect, Teardown::Close, Teardown::Stop];

/// Parameters for opening a realtime session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub model: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    #[error("Failed to connect to realtime service: {0}")]
    Connect(String),
    #[error("Realtime transport error: {0}")]
    Transport(String),
    #[error("Realtime protocol error: {0}")]
    Protocol(String),
    #[error("Teardown method `{0}` is not supported by this session")]
    Unsupported(Teardown),
}

/// A live connection to the realtime backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RealtimeSession: Send + Sync {
    /// The shutdown methods this session implements.
    fn supported_teardowns(&self) -> Vec<Teardown>;

    /// Executes one shutdown method.
    async fn teardown(&self, method: Teardown) -> Result<(), RealtimeError>;
}

/// Opens realtime sessions for an agent.
#[async_trait]
pub trait RealtimeConnector: Send + Sync {
    /// Connects using `credential` as the API key. The agent's instructions and
    /// tools are registered with the backend as part of the handshake.
    async fn connect(
        &self,
        agent: Arc<AgentDefinition>,
        config: SessionConfig,
        credential: Credential,
    ) -> Result<Box<dyn RealtimeSession>, RealtimeError>;
}
