use crate::models::{
    CompatibilityResponse, CompatibilityResult, CrushRequest, CrushResponse, Match,
    MatchNotification, UserStats,
};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use validator::Validate;

/// Errors that can occur when talking to the remote store
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Authoritative record of submissions and matches
#[async_trait]
pub trait CrushStore: Send + Sync {
    async fn submit_crush(&self, crusher: &str, crush: &str) -> Result<CrushResponse, RemoteError>;
    async fn stats(&self, address: &str) -> Result<UserStats, RemoteError>;
    async fn matches(&self, address: &str) -> Result<Vec<Match>, RemoteError>;
}

/// Source of non-binding compatibility previews
#[async_trait]
pub trait CompatibilityOracle: Send + Sync {
    async fn compatibility(&self, own: &str, candidate: &str) -> Result<CompatibilityResult, RemoteError>;
}

/// HTTP client for the crush store API
///
/// Handles all communication with the remote store including:
/// - Submitting crush declarations
/// - Fetching stats and matches
/// - Looking up compatibility previews
pub struct RemoteClient {
    base_url: String,
    client: Client,
}

impl RemoteClient {
    /// Create a new remote client
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn ensure_success(response: reqwest::Response, what: &str) -> Result<reqwest::Response, RemoteError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_else(|_| "Unable to read body".to_string());
        tracing::debug!("{} failed: {} - {}", what, status, body);
        Err(RemoteError::ApiError(format!("Failed to {}: {}", what, status)))
    }
}

#[async_trait]
impl CrushStore for RemoteClient {
    async fn submit_crush(&self, crusher: &str, crush: &str) -> Result<CrushResponse, RemoteError> {
        let url = self.url("/api/crush/submit");
        let payload = CrushRequest {
            crusher_address: crusher.to_string(),
            crush_address: crush.to_string(),
        };

        let response = self.client.post(&url).json(&payload).send().await?;
        let response = Self::ensure_success(response, "submit crush").await?;

        response
            .json::<CrushResponse>()
            .await
            .map_err(|e| RemoteError::InvalidResponse(format!("Failed to parse submission response: {}", e)))
    }

    async fn stats(&self, address: &str) -> Result<UserStats, RemoteError> {
        let url = self.url(&format!("/api/stats/{}", urlencoding::encode(address)));

        tracing::debug!("Fetching stats from: {}", url);

        let response = self.client.get(&url).send().await?;
        let response = Self::ensure_success(response, "fetch stats").await?;

        response
            .json::<UserStats>()
            .await
            .map_err(|e| RemoteError::InvalidResponse(format!("Failed to parse stats: {}", e)))
    }

    async fn matches(&self, address: &str) -> Result<Vec<Match>, RemoteError> {
        let url = self.url(&format!("/api/matches/{}", urlencoding::encode(address)));

        tracing::debug!("Fetching matches from: {}", url);

        let response = self.client.get(&url).send().await?;
        let response = Self::ensure_success(response, "fetch matches").await?;

        let notifications: Vec<MatchNotification> = response
            .json()
            .await
            .map_err(|e| RemoteError::InvalidResponse(format!("Failed to parse matches: {}", e)))?;

        Ok(notifications
            .into_iter()
            .map(|n| Match::new(n.your_address, n.matched_address, n.matched_at))
            .collect())
    }
}

#[async_trait]
impl CompatibilityOracle for RemoteClient {
    async fn compatibility(&self, own: &str, candidate: &str) -> Result<CompatibilityResult, RemoteError> {
        let url = format!(
            "{}?address1={}&address2={}",
            self.url("/api/compatibility"),
            urlencoding::encode(own),
            urlencoding::encode(candidate)
        );

        let response = self.client.get(&url).send().await?;
        let response = Self::ensure_success(response, "check compatibility").await?;

        let body: CompatibilityResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::InvalidResponse(format!("Failed to parse compatibility: {}", e)))?;

        body.validate()
            .map_err(|e| RemoteError::InvalidResponse(format!("Compatibility out of range: {}", e)))?;

        Ok(body.into())
    }
}
