//! # Chanmint API
//!
//! HTTP client for the remote identity provider.
//!
//! The identity provider owns user accounts; chanmint only forwards
//! registrations to it. Every request carries a bearer token, either a static
//! one from configuration or one supplied per call (the service mints a
//! short-lived app token when none is configured).
//!
//! ```no_run
//! # async fn run() -> Result<(), chanmint_api::ApiError> {
//! use chanmint_api::IdentityClient;
//!
//! let client = IdentityClient::builder()
//!     .base_url("https://identity.example.com/org/app")
//!     .bearer_token("static-token")
//!     .build()?;
//!
//! let user = client.create_user("alice", "s3cret", None).await?;
//! println!("{}", user.0);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use chanmint_config::{IdentityApiConfig, DEFAULT_IDENTITY_API_TIMEOUT};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("identity API returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Missing bearer token for the identity API")]
    MissingBearerToken,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Request payload for registering a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
}

/// Whatever the identity provider answered with, passed through untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CreatedUser(pub serde_json::Value);

/// Client for the remote identity API
#[derive(Debug, Clone)]
pub struct IdentityClient {
    base_url: String,
    bearer_token: Option<String>,
    client: reqwest::Client,
}

impl IdentityClient {
    pub fn builder() -> IdentityClientBuilder {
        IdentityClientBuilder::new()
    }

    pub fn from_config(config: &IdentityApiConfig) -> Result<Self, ApiError> {
        IdentityClientBuilder::from_config(config).build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether requests can be authorized without a per-call token
    pub fn has_bearer_token(&self) -> bool {
        self.bearer_token.is_some()
    }

    /// Register a user with the identity provider.
    ///
    /// `bearer_token` takes precedence over the configured static token. The
    /// request is sent once; a non-2xx answer becomes
    /// [`ApiError::UpstreamStatus`] carrying the upstream body.
    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        bearer_token: Option<&str>,
    ) -> Result<CreatedUser, ApiError> {
        let token = bearer_token
            .or(self.bearer_token.as_deref())
            .ok_or(ApiError::MissingBearerToken)?;

        let url = format!("{}/users", self.base_url);
        let body = CreateUserRequest {
            username: username.to_string(),
            password: password.to_string(),
        };

        debug!(%url, username, "creating user");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "identity API rejected user creation");
            return Err(ApiError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(CreatedUser(serde_json::Value::Null));
        }

        serde_json::from_str(&text)
            .map(CreatedUser)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }
}

/// Builder for IdentityClient
#[derive(Debug, Clone)]
pub struct IdentityClientBuilder {
    base_url: Option<String>,
    bearer_token: Option<String>,
    timeout: Duration,
}

impl Default for IdentityClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            bearer_token: None,
            timeout: Duration::from_secs(DEFAULT_IDENTITY_API_TIMEOUT),
        }
    }

    pub fn from_config(config: &IdentityApiConfig) -> Self {
        let mut builder = Self::new()
            .base_url(config.base_url.clone())
            .timeout(Duration::from_secs(config.timeout_secs));
        if let Some(token) = &config.bearer_token {
            builder = builder.bearer_token(token.clone());
        }
        builder
    }

    /// Base URL including the scheme; a trailing slash is ignored
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<IdentityClient, ApiError> {
        let base_url = self
            .base_url
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ApiError::Config("base URL is required".to_string()))?;

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ApiError::Config(format!(
                "base URL must start with http:// or https://: {}",
                base_url
            )));
        }

        if self.timeout.is_zero() {
            return Err(ApiError::Config("timeout must be positive".to_string()));
        }

        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        Ok(IdentityClient {
            base_url,
            bearer_token: self.bearer_token.filter(|token| !token.is_empty()),
            client,
        })
    }
}
