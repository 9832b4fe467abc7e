//! Ephemeral Credential Provider
//!
//! This module mints the short-lived credential a realtime session authenticates
//! with. The backend exposes a `POST /session` endpoint that returns the value at
//! `client_secret.value`; a fresh credential is requested for every session and
//! nothing is cached locally.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::{fmt, time::Duration};
use tracing::{debug, error, info, warn};

/// Failures while obtaining an ephemeral credential from the backend.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Credential request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Credential request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid credential response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Credential response has no `client_secret.value` field")]
    MissingField,
}

/// An opaque, short-lived access token for a single realtime session.
///
/// The value is never printed; use [`Credential::expose`] only at the point
/// where it is handed to the realtime transport.
pub struct Credential(SecretString);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    /// Returns the raw token.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// Anything that can hand out a fresh ephemeral credential.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Performs exactly one request for a new credential.
    async fn fetch_credential(&self) -> Result<Credential, CredentialError>;
}

/// A `CredentialProvider` backed by the session backend's `/session` endpoint.
pub struct BackendCredentialProvider {
    http: reqwest::Client,
    base_url: String,
}

impl BackendCredentialProvider {
    /// Hosted backend used when `BACKEND_URL` is not configured.
    pub const DEFAULT_BASE_URL: &'static str = "https://app-orion-dev.azurewebsites.net";

    /// Creates a provider whose every request is bounded by `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CredentialError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    fn session_url(&self) -> String {
        format!("{}/session", self.base_url.trim_end_matches('/'))
    }

    async fn request_credential(&self) -> Result<Credential, CredentialError> {
        let url = self.session_url();
        debug!(%url, "Requesting ephemeral credential from backend");

        let response = self.http.post(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!(status = status.as_u16(), %body, "Backend rejected credential request");
            return Err(CredentialError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = serde_json::from_str(&body)?;
        match payload
            .pointer("/client_secret/value")
            .and_then(Value::as_str)
        {
            Some(value) => {
                info!("Ephemeral credential received");
                Ok(Credential::new(value))
            }
            None => {
                // Only the shape is logged: the payload may still carry secrets.
                let fields: Vec<&str> = payload
                    .as_object()
                    .map(|object| object.keys().map(String::as_str).collect())
                    .unwrap_or_default();
                warn!(?fields, "Credential response has an unexpected structure");
                Err(CredentialError::MissingField)
            }
        }
    }
}

#[async_trait]
impl CredentialProvider for BackendCredentialProvider {
    async fn fetch_credential(&self) -> Result<Credential, CredentialError> {
        self.request_credential()
            .await
            .inspect_err(|e| error!(error = %e, "Failed to obtain ephemeral credential"))
    }
}
