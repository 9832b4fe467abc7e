//! In-crate test doubles for the credential and realtime boundaries.

use crate::{
    agent::AgentDefinition,
    credential::{Credential, CredentialError, CredentialProvider},
    realtime::{RealtimeConnector, RealtimeError, RealtimeSession, SessionConfig, Teardown},
};
use async_trait::async_trait;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

/// Hands out a fixed token, or fails with `MissingField` when `None`.
pub struct StaticCredentials(pub Option<&'static str>);

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn fetch_credential(&self) -> Result<Credential, CredentialError> {
        self.0.map(Credential::new).ok_or(CredentialError::MissingField)
    }
}

/// Records every connect attempt and returns a [`FakeSession`].
#[derive(Default)]
pub struct RecordingConnector {
    pub connects: AtomicUsize,
    pub last_model: Mutex<Option<String>>,
    pub last_api_key: Mutex<Option<String>>,
    pub fail_with: Option<&'static str>,
}

#[async_trait]
impl RealtimeConnector for RecordingConnector {
    async fn connect(
        &self,
        _agent: Arc<AgentDefinition>,
        config: SessionConfig,
        credential: Credential,
    ) -> Result<Box<dyn RealtimeSession>, RealtimeError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        *self.last_model.lock().unwrap() = Some(config.model);
        *self.last_api_key.lock().unwrap() = Some(credential.expose().to_string());
        if let Some(reason) = self.fail_with {
            return Err(RealtimeError::Connect(reason.to_string()));
        }
        Ok(Box::new(FakeSession::new(vec![Teardown::Disconnect])))
    }
}

/// A session that logs which teardown methods were called.
pub struct FakeSession {
    supported: Vec<Teardown>,
    pub calls: Arc<Mutex<Vec<Teardown>>>,
}

impl FakeSession {
    pub fn new(supported: Vec<Teardown>) -> Self {
        Self {
            supported,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl RealtimeSession for FakeSession {
    fn supported_teardowns(&self) -> Vec<Teardown> {
        self.supported.clone()
    }

    async fn teardown(&self, method: Teardown) -> Result<(), RealtimeError> {
        self.calls.lock().unwrap().push(method);
        Ok(())
    }
}

/// A connector whose handshake never completes.
pub struct HangingConnector;

#[async_trait]
impl RealtimeConnector for HangingConnector {
    async fn connect(
        &self,
        _agent: Arc<AgentDefinition>,
        _config: SessionConfig,
        _credential: Credential,
    ) -> Result<Box<dyn RealtimeSession>, RealtimeError> {
        std::future::pending().await
    }
}

/// A session whose teardown never returns.
pub struct HangingSession(pub Teardown);

#[async_trait]
impl RealtimeSession for HangingSession {
    fn supported_teardowns(&self) -> Vec<Teardown> {
        vec![self.0]
    }

    async fn teardown(&self, _method: Teardown) -> Result<(), RealtimeError> {
        std::future::pending().await
    }
}
