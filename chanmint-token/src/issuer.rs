use chanmint_config::{ExpiryPolicy, DEFAULT_APP_TOKEN_TTL};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::error::TokenError;
use crate::signer::{
    AppCredentials, ChannelRole, IdentityRole, Privilege, Signer, SigningRequest, Subject,
    DEFAULT_UID,
};

/// A signed token together with the expiry it was issued with
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: Option<i64>,
}

/// Normalizes issuance requests and hands them to a [`Signer`].
///
/// Defaults applied when the caller leaves a field out:
/// - uid: [`DEFAULT_UID`]
/// - channel role: [`ChannelRole::Publisher`]
/// - identity role: [`IdentityRole::User`]
/// - expiry: resolved through the issuer's [`ExpiryPolicy`]
///
/// Signer failures come back as [`TokenError::Signing`] with the signer's
/// message preserved.
#[derive(Clone)]
pub struct TokenIssuer {
    signer: Arc<dyn Signer>,
    expiry_policy: ExpiryPolicy,
}

impl TokenIssuer {
    /// Create an issuer using the default expiry policy
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        Self {
            signer,
            expiry_policy: ExpiryPolicy::default(),
        }
    }

    pub fn with_expiry_policy(mut self, expiry_policy: ExpiryPolicy) -> Self {
        self.expiry_policy = expiry_policy;
        self
    }

    pub fn expiry_policy(&self) -> ExpiryPolicy {
        self.expiry_policy
    }

    /// Issue a token granting `role` in `channel_name` to `uid`
    pub fn issue_join_token(
        &self,
        credentials: &AppCredentials,
        channel_name: &str,
        uid: Option<u32>,
        role: Option<ChannelRole>,
        expires_at: Option<i64>,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_join_token_with_time(
            credentials,
            channel_name,
            uid,
            role,
            expires_at,
            Utc::now().timestamp(),
        )
    }

    pub fn issue_join_token_with_time(
        &self,
        credentials: &AppCredentials,
        channel_name: &str,
        uid: Option<u32>,
        role: Option<ChannelRole>,
        expires_at: Option<i64>,
        now: i64,
    ) -> Result<IssuedToken, TokenError> {
        validate_credentials(credentials)?;
        let channel_name = require("channel_name", channel_name)?;
        let expires_at = self.resolve_expiry(expires_at, now)?;

        let request = SigningRequest {
            credentials: credentials.clone(),
            subject: Subject::Channel {
                name: channel_name.to_string(),
                uid: uid.unwrap_or(DEFAULT_UID),
            },
            privilege: Privilege::Channel(role.unwrap_or_default()),
            expires_at,
        };

        self.sign(request)
    }

    /// Issue a token asserting the identity `user_id`
    pub fn issue_identity_token(
        &self,
        credentials: &AppCredentials,
        user_id: &str,
        role: Option<IdentityRole>,
        expires_at: Option<i64>,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_identity_token_with_time(
            credentials,
            user_id,
            role,
            expires_at,
            Utc::now().timestamp(),
        )
    }

    pub fn issue_identity_token_with_time(
        &self,
        credentials: &AppCredentials,
        user_id: &str,
        role: Option<IdentityRole>,
        expires_at: Option<i64>,
        now: i64,
    ) -> Result<IssuedToken, TokenError> {
        validate_credentials(credentials)?;
        let user_id = require("user_id", user_id)?;
        let expires_at = self.resolve_expiry(expires_at, now)?;

        let request = SigningRequest {
            credentials: credentials.clone(),
            subject: Subject::User {
                user_id: user_id.to_string(),
            },
            privilege: Privilege::Identity(role.unwrap_or_default()),
            expires_at,
        };

        self.sign(request)
    }

    /// Issue an application level token valid for `expires_in` seconds
    /// (one hour when omitted).
    pub fn issue_app_token(
        &self,
        credentials: &AppCredentials,
        expires_in: Option<i64>,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_app_token_with_time(credentials, expires_in, Utc::now().timestamp())
    }

    pub fn issue_app_token_with_time(
        &self,
        credentials: &AppCredentials,
        expires_in: Option<i64>,
        now: i64,
    ) -> Result<IssuedToken, TokenError> {
        validate_credentials(credentials)?;
        let expires_in = expires_in.unwrap_or(DEFAULT_APP_TOKEN_TTL);
        if expires_in <= 0 {
            return Err(TokenError::validation("expires_in must be positive"));
        }
        let expires_at = now
            .checked_add(expires_in)
            .ok_or_else(|| TokenError::validation("expires_in is too large"))?;

        let request = SigningRequest {
            credentials: credentials.clone(),
            subject: Subject::App,
            privilege: Privilege::Identity(IdentityRole::App),
            expires_at: Some(expires_at),
        };

        self.sign(request)
    }

    fn resolve_expiry(&self, expires_at: Option<i64>, now: i64) -> Result<Option<i64>, TokenError> {
        match expires_at {
            Some(at) if at <= now => Err(TokenError::validation(format!(
                "expires_at {} is not in the future",
                at
            ))),
            Some(at) => Ok(Some(at)),
            None => Ok(self.expiry_policy.resolve(now)),
        }
    }

    fn sign(&self, request: SigningRequest) -> Result<IssuedToken, TokenError> {
        let token = self
            .signer
            .sign(&request)
            .map_err(|e| TokenError::signing(e.to_string()))?;

        info!(
            app_id = %request.credentials.app_id,
            subject = ?request.subject,
            role = request.privilege.as_str(),
            expires_at = ?request.expires_at,
            "issued token"
        );

        Ok(IssuedToken {
            token,
            expires_at: request.expires_at,
        })
    }
}

// Blank values are rejected; anything else is signed exactly as given so the
// token names the same channel the registry matches against.
fn require<'a>(field: &str, value: &'a str) -> Result<&'a str, TokenError> {
    if value.trim().is_empty() {
        Err(TokenError::validation(format!("{} is required", field)))
    } else {
        Ok(value)
    }
}

fn validate_credentials(credentials: &AppCredentials) -> Result<(), TokenError> {
    require("app_id", &credentials.app_id)?;
    require("app_certificate", &credentials.app_certificate)?;
    Ok(())
}
