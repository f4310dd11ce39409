//! # Chanmint
//!
//! HTTP service that mints short-lived channels for real-time communication
//! apps and signs the tokens clients need to join them.
//!
//! The service is a thin layer over three workspace crates:
//!
//! - `chanmint-registry`: the in-memory, expiring channel registry
//! - `chanmint-token`: token issuance behind a pluggable [`Signer`]
//! - `chanmint-api`: the client for the remote identity provider
//!
//! Configuration comes from `chanmint-config`; see [`ServiceConfig`].
//!
//! ## Embedding
//!
//! ```no_run
//! use std::sync::Arc;
//! use chanmint::{router, ChannelService, ServiceConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServiceConfig::from_env_or_file("CHANMINT")?;
//! let service = Arc::new(ChannelService::from_config(&config)?);
//!
//! let listener = tokio::net::TcpListener::bind(config.socket_address()).await?;
//! axum::serve(listener, router(service)).await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod routes;
mod service;
mod sweep;

pub use error::ServiceError;
pub use routes::{router, AppState};
pub use service::{ChannelService, MintedChannel};
pub use sweep::spawn_sweeper;

pub use chanmint_api::{ApiError, CreatedUser, IdentityClient, IdentityClientBuilder};
pub use chanmint_config::{
    try_load_default_config, ConfigError, ExpiryPolicy, IdentityApiConfig, ServiceConfig,
    ServiceConfigBuilder,
};
pub use chanmint_registry::{ChannelNameGenerator, ChannelRecord, ChannelRegistry};
pub use chanmint_token::{
    AppCredentials, BiscuitSigner, ChannelRole, IdentityRole, IssuedToken, Privilege, Signer,
    SigningRequest, Subject, TokenError, TokenIssuer, DEFAULT_UID,
};
