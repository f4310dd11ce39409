use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TokenError;

/// Uid carried by join tokens when the caller does not name a user.
///
/// A token bound to this uid admits any user into the channel.
pub const DEFAULT_UID: u32 = 0;

/// Application identity handed to the signer with every request
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppCredentials {
    pub app_id: String,
    /// Signing key material, a PEM encoded ed25519 private key for [`crate::BiscuitSigner`]
    pub app_certificate: String,
}

impl AppCredentials {
    pub fn new(app_id: impl Into<String>, app_certificate: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_certificate: app_certificate.into(),
        }
    }
}

impl fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppCredentials")
            .field("app_id", &self.app_id)
            .field("app_certificate", &"<redacted>")
            .finish()
    }
}

/// Privilege granted inside a channel
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelRole {
    #[default]
    Publisher,
    Subscriber,
}

impl ChannelRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelRole::Publisher => "publisher",
            ChannelRole::Subscriber => "subscriber",
        }
    }
}

/// Privilege attached to identity tokens
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityRole {
    #[default]
    User,
    App,
}

impl IdentityRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityRole::User => "user",
            IdentityRole::App => "app",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Privilege {
    Channel(ChannelRole),
    Identity(IdentityRole),
}

impl Privilege {
    pub fn as_str(&self) -> &'static str {
        match self {
            Privilege::Channel(role) => role.as_str(),
            Privilege::Identity(role) => role.as_str(),
        }
    }
}

/// Who a token is issued for
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Subject {
    Channel { name: String, uid: u32 },
    User { user_id: String },
    App,
}

/// Everything a signer needs to produce one token
#[derive(Clone, Debug)]
pub struct SigningRequest {
    pub credentials: AppCredentials,
    pub subject: Subject,
    pub privilege: Privilege,
    /// Absolute expiry in seconds since the epoch, `None` for tokens that never expire
    pub expires_at: Option<i64>,
}

/// Produces opaque signed token strings.
///
/// Implementations own the token format; callers only rely on the string
/// coming back or a [`TokenError`] describing why it could not be produced.
pub trait Signer: Send + Sync {
    fn sign(&self, request: &SigningRequest) -> Result<String, TokenError>;
}
