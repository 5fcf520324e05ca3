//! Remote collaborator that applies changes to the backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use thiserror::Error;

use super::change::ChangeType;

/// Why the backend did not accept a change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status.
    #[error("rejected with status {status}: {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// The request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Applies a single change to the remote system.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteApply: Send + Sync {
    /// Apply one change.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend did not confirm the change.
    async fn apply(&self, change_type: ChangeType, payload: &[u8]) -> Result<(), ApplyError>;
}

/// HTTP method and path segment for a change type.
#[must_use]
pub fn route(change_type: ChangeType) -> (Method, &'static str) {
    match change_type {
        ChangeType::BabyUpdate => (Method::PUT, "babies"),
        ChangeType::MilestoneCreate => (Method::POST, "milestones"),
        ChangeType::MilestoneUpdate => (Method::PUT, "milestones"),
        ChangeType::MilestoneDelete => (Method::DELETE, "milestones"),
        ChangeType::AppointmentCreate => (Method::POST, "appointments"),
        ChangeType::AppointmentUpdate => (Method::PUT, "appointments"),
        ChangeType::AppointmentDelete => (Method::DELETE, "appointments"),
        ChangeType::TrackingRecord => (Method::POST, "tracking"),
        ChangeType::EmergencyContact => (Method::PUT, "emergency-contacts"),
    }
}

/// Backend API client.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpRemote {
    /// Create a client for `base_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        auth_token: Option<String>,
    ) -> Result<Self, ApplyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApplyError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
        })
    }

    /// Underlying HTTP client, shared with the connectivity probe.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// Full URL for a change type.
    #[must_use]
    pub fn url_for(&self, change_type: ChangeType) -> String {
        let (_, path) = route(change_type);
        format!("{}/{path}", self.base_url)
    }
}

#[async_trait]
impl RemoteApply for HttpRemote {
    async fn apply(&self, change_type: ChangeType, payload: &[u8]) -> Result<(), ApplyError> {
        let (method, _) = route(change_type);
        let mut request = self
            .client
            .request(method, self.url_for(change_type))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header("X-Change-Type", change_type.as_str())
            .body(payload.to_vec());

        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApplyError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        Err(rejection(status, message))
    }
}

fn rejection(status: StatusCode, message: String) -> ApplyError {
    let message = if message.trim().is_empty() {
        status.canonical_reason().unwrap_or("unknown").to_string()
    } else {
        message
    };
    ApplyError::Rejected {
        status: status.as_u16(),
        message,
    }
}
