//! Realtime Session Management
//!
//! The [`SessionManager`] owns the bootstrap sequence for a realtime session:
//! fetch a fresh ephemeral credential, choose the model, connect through the
//! injected [`RealtimeConnector`]. It also owns teardown, which is best-effort
//! and never fails the caller.

use crate::{
    agent::AgentDefinition,
    credential::{CredentialError, CredentialProvider},
    realtime::{
        RealtimeConnector, RealtimeError, RealtimeSession, SessionConfig, TEARDOWN_PRIORITY,
        Teardown,
    },
};
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tracing::{debug, error, info, instrument, warn};

/// Realtime model used when the caller does not pick one.
pub const DEFAULT_MODEL: &str = "gpt-4o-realtime-preview-2025-06-03";

/// Bound applied to connecting and to each teardown call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No ephemeral credential was obtained")]
    NoCredential,
    #[error("Failed to obtain ephemeral credential: {0}")]
    Credential(#[source] CredentialError),
    #[error("Failed to open realtime session: {0}")]
    Connect(#[from] RealtimeError),
    #[error("Realtime session did not open within {0:?}")]
    Timeout(Duration),
}

impl From<CredentialError> for SessionError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::MissingField => SessionError::NoCredential,
            other => SessionError::Credential(other),
        }
    }
}

/// Per-session overrides for [`SessionManager::open`].
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub model: Option<String>,
}

/// How a session will be shut down, decided once when it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownPlan {
    /// A full shutdown method from [`TEARDOWN_PRIORITY`].
    Graceful(Teardown),
    /// Only audio can be stopped; the connection may stay open.
    AudioOnly,
    /// The session exposes no shutdown method at all.
    Unavailable,
}

impl TeardownPlan {
    pub fn resolve(supported: &[Teardown]) -> Self {
        TEARDOWN_PRIORITY
            .iter()
            .copied()
            .find(|method| supported.contains(method))
            .map(TeardownPlan::Graceful)
            .unwrap_or(if supported.contains(&Teardown::StopAudio) {
                TeardownPlan::AudioOnly
            } else {
                TeardownPlan::Unavailable
            })
    }
}

/// A live realtime session bound to the agent it was opened for.
pub struct Session {
    agent: Arc<AgentDefinition>,
    model: String,
    inner: Box<dyn RealtimeSession>,
    plan: TeardownPlan,
    closed: AtomicBool,
}

impl Session {
    pub(crate) fn new(
        agent: Arc<AgentDefinition>,
        model: String,
        inner: Box<dyn RealtimeSession>,
    ) -> Self {
        let plan = TeardownPlan::resolve(&inner.supported_teardowns());
        Self {
            agent,
            model,
            inner,
            plan,
            closed: AtomicBool::new(false),
        }
    }

    pub fn agent(&self) -> &Arc<AgentDefinition> {
        &self.agent
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn teardown_plan(&self) -> TeardownPlan {
        self.plan
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("agent", &self.agent.name)
            .field("model", &self.model)
            .field("plan", &self.plan)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Opens and closes realtime sessions.
#[derive(Clone)]
pub struct SessionManager {
    credentials: Arc<dyn CredentialProvider>,
    connector: Arc<dyn RealtimeConnector>,
    default_model: String,
    timeout: Duration,
}

impl SessionManager {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn RealtimeConnector>,
    ) -> Self {
        Self {
            credentials,
            connector,
            default_model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Opens a realtime session for `agent`.
    ///
    /// A new credential is fetched for every call. Nothing is connected when
    /// no credential could be obtained.
    #[instrument(name = "open_session", skip_all, fields(agent = %agent.name))]
    pub async fn open(
        &self,
        agent: Arc<AgentDefinition>,
        options: &SessionOptions,
    ) -> Result<Session, SessionError> {
        match self.connect(agent, options).await {
            Ok(session) => {
                info!(model = %session.model(), "Realtime session started");
                Ok(session)
            }
            Err(e) => {
                error!(error = %e, "Failed to start realtime session");
                Err(e)
            }
        }
    }

    async fn connect(
        &self,
        agent: Arc<AgentDefinition>,
        options: &SessionOptions,
    ) -> Result<Session, SessionError> {
        let credential = self.credentials.fetch_credential().await?;
        if credential.is_empty() {
            return Err(SessionError::NoCredential);
        }

        let model = options
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        let config = SessionConfig {
            model: model.clone(),
        };

        let inner = tokio::time::timeout(
            self.timeout,
            self.connector.connect(agent.clone(), config, credential),
        )
        .await
        .map_err(|_| SessionError::Timeout(self.timeout))??;

        Ok(Session::new(agent, model, inner))
    }

    /// Shuts a session down.
    ///
    /// `None` and already-closed sessions are ignored. Failures are logged and
    /// swallowed: this never returns an error.
    pub async fn close(&self, session: Option<&Session>) {
        let Some(session) = session else {
            return;
        };
        if session.closed.swap(true, Ordering::SeqCst) {
            debug!(agent = %session.agent.name, "Session already closed");
            return;
        }

        let method = match session.plan {
            TeardownPlan::Graceful(method) => method,
            TeardownPlan::AudioOnly => {
                warn!(
                    agent = %session.agent.name,
                    "No shutdown method available for session, stopping audio only"
                );
                Teardown::StopAudio
            }
            TeardownPlan::Unavailable => {
                warn!(
                    agent = %session.agent.name,
                    "Session exposes no shutdown method, resources may not be released"
                );
                return;
            }
        };

        match tokio::time::timeout(self.timeout, session.inner.teardown(method)).await {
            Ok(Ok(())) => info!(agent = %session.agent.name, %method, "Realtime session closed"),
            Ok(Err(e)) => error!(%method, error = %e, "Failed to close realtime session"),
            Err(_) => error!(%method, timeout = ?self.timeout, "Timed out closing realtime session"),
        }
    }
}
