use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use chanmint_api::{CreatedUser, IdentityClient};
use chanmint_config::{ServiceConfig, DEFAULT_APP_TOKEN_TTL};
use chanmint_registry::{ChannelRecord, ChannelRegistry};
use chanmint_token::{
    public_key_from_certificate, public_key_to_string, AppCredentials, BiscuitSigner,
    ChannelRole, IdentityRole, IssuedToken, Signer, TokenIssuer, DEFAULT_UID,
};

use crate::error::ServiceError;

/// Outcome of [`ChannelService::mint_channel`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MintedChannel {
    pub channel_name: String,
    pub expires_at: i64,
    pub uid: u32,
    pub token: String,
}

/// Channel registry and token issuer bound to one set of application credentials.
///
/// This is what the HTTP handlers talk to. It owns input validation for the
/// operations that combine the registry with the issuer, and it is the only
/// place that knows how the identity API is authorized.
pub struct ChannelService {
    credentials: AppCredentials,
    registry: Arc<ChannelRegistry>,
    issuer: TokenIssuer,
    identity: Option<IdentityClient>,
    app_token_ttl: i64,
}

impl ChannelService {
    pub fn new(
        credentials: AppCredentials,
        registry: ChannelRegistry,
        issuer: TokenIssuer,
    ) -> Self {
        Self {
            credentials,
            registry: Arc::new(registry),
            issuer,
            identity: None,
            app_token_ttl: DEFAULT_APP_TOKEN_TTL,
        }
    }

    /// Build a service signing with [`BiscuitSigner`]
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ServiceError> {
        Self::from_config_with_signer(config, Arc::new(BiscuitSigner::new()))
    }

    pub fn from_config_with_signer(
        config: &ServiceConfig,
        signer: Arc<dyn Signer>,
    ) -> Result<Self, ServiceError> {
        let credentials = AppCredentials::new(&config.app_id, &config.app_certificate);
        let issuer = TokenIssuer::new(signer).with_expiry_policy(config.token_expiry);
        let mut service = Self::new(credentials, ChannelRegistry::from_config(config), issuer)
            .with_app_token_ttl(config.app_token_ttl);

        if let Some(identity_api) = &config.identity_api {
            let client = IdentityClient::from_config(identity_api)
                .map_err(|e| ServiceError::Config(e.to_string()))?;
            service = service.with_identity_client(client);
        }

        Ok(service)
    }

    pub fn with_identity_client(mut self, client: IdentityClient) -> Self {
        self.identity = Some(client);
        self
    }

    pub fn with_app_token_ttl(mut self, seconds: i64) -> Self {
        self.app_token_ttl = seconds;
        self
    }

    /// Shared handle to the registry, used by the background sweeper
    pub fn registry(&self) -> Arc<ChannelRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn app_token_ttl(&self) -> i64 {
        self.app_token_ttl
    }

    pub fn app_id(&self) -> &str {
        &self.credentials.app_id
    }

    /// Mint a channel and a join token that expires together with it.
    ///
    /// `expires_in` is the channel lifetime in seconds; when omitted the
    /// registry TTL applies. Zero or negative lifetimes are rejected.
    pub fn mint_channel(
        &self,
        uid: Option<u32>,
        expires_in: Option<i64>,
    ) -> Result<MintedChannel, ServiceError> {
        self.mint_channel_with_time(uid, expires_in, Utc::now().timestamp())
    }

    pub fn mint_channel_with_time(
        &self,
        uid: Option<u32>,
        expires_in: Option<i64>,
        now: i64,
    ) -> Result<MintedChannel, ServiceError> {
        if let Some(seconds) = expires_in {
            if seconds <= 0 {
                return Err(ServiceError::validation("expires_in must be positive"));
            }
        }

        let record = self.registry.mint_channel_with_time(expires_in, now);
        // A signing failure leaves the record registered; it simply ages out.
        let issued = self.issuer.issue_join_token_with_time(
            &self.credentials,
            &record.name,
            uid,
            None,
            Some(record.expires_at),
            now,
        )?;

        info!(channel = %record.name, expires_at = record.expires_at, "minted channel");

        Ok(MintedChannel {
            channel_name: record.name,
            expires_at: record.expires_at,
            uid: uid.unwrap_or(DEFAULT_UID),
            token: issued.token,
        })
    }

    /// Whether `channel_name` names a live channel. Missing or blank names are
    /// rejected; any other name is matched exactly, surrounding whitespace included.
    pub fn channel_exists(&self, channel_name: Option<&str>) -> Result<bool, ServiceError> {
        self.channel_exists_at(channel_name, Utc::now().timestamp())
    }

    pub fn channel_exists_at(
        &self,
        channel_name: Option<&str>,
        now: i64,
    ) -> Result<bool, ServiceError> {
        let name = channel_name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ServiceError::validation("channel_name is required"))?;

        let exists = self.registry.exists_at(name, now);
        debug!(channel = %name, exists, "channel lookup");
        Ok(exists)
    }

    pub fn live_channels(&self) -> Vec<ChannelRecord> {
        self.registry.live_channels()
    }

    pub fn sweep_expired(&self) -> usize {
        self.registry.sweep_expired()
    }

    pub fn issue_join_token(
        &self,
        channel_name: &str,
        uid: Option<u32>,
        role: Option<ChannelRole>,
        expires_at: Option<i64>,
    ) -> Result<IssuedToken, ServiceError> {
        Ok(self
            .issuer
            .issue_join_token(&self.credentials, channel_name, uid, role, expires_at)?)
    }

    pub fn issue_identity_token(
        &self,
        user_id: &str,
        role: Option<IdentityRole>,
        expires_at: Option<i64>,
    ) -> Result<IssuedToken, ServiceError> {
        Ok(self
            .issuer
            .issue_identity_token(&self.credentials, user_id, role, expires_at)?)
    }

    /// Application level token; `expires_in` falls back to the configured app token TTL
    pub fn issue_app_token(&self, expires_in: Option<i64>) -> Result<IssuedToken, ServiceError> {
        Ok(self.issuer.issue_app_token(
            &self.credentials,
            Some(expires_in.unwrap_or(self.app_token_ttl)),
        )?)
    }

    /// Register a user with the remote identity API.
    ///
    /// Without a static bearer token configured, a fresh app token authorizes
    /// the call.
    pub async fn create_user(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<CreatedUser, ServiceError> {
        let username = required("username", username)?;
        let password = required("password", password)?;
        let client = self
            .identity
            .as_ref()
            .ok_or(ServiceError::IdentityApiUnavailable)?;

        let minted;
        let bearer = if client.has_bearer_token() {
            None
        } else {
            minted = self.issue_app_token(None)?;
            Some(minted.token.as_str())
        };

        let user = client.create_user(username, password, bearer).await?;
        info!(username, "created user");
        Ok(user)
    }

    /// Verification key for tokens signed by the built-in signer, as `ed25519/<hex>`
    pub fn public_key(&self) -> Result<String, ServiceError> {
        let key = public_key_from_certificate(&self.credentials.app_certificate)?;
        Ok(public_key_to_string(&key))
    }
}

fn required<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str, ServiceError> {
    value
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ServiceError::validation(format!("{} is required", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanmint_registry::ChannelNameGenerator;
    use chanmint_token::{SigningRequest, Subject, TokenError};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingSigner {
        calls: Mutex<Vec<SigningRequest>>,
    }

    impl Signer for CapturingSigner {
        fn sign(&self, request: &SigningRequest) -> Result<String, TokenError> {
            self.calls.lock().unwrap().push(request.clone());
            Ok("stub-token".to_string())
        }
    }

    fn service(signer: Arc<CapturingSigner>) -> ChannelService {
        ChannelService::new(
            AppCredentials::new("demo-app", "certificate"),
            ChannelRegistry::new(3600, ChannelNameGenerator::new("channel_", 1, 999_999)),
            TokenIssuer::new(signer),
        )
    }

    #[test]
    fn test_mint_channel_binds_token_to_record_expiry() {
        let signer = Arc::new(CapturingSigner::default());
        let service = service(signer.clone());

        let minted = service.mint_channel_with_time(Some(7), None, 1_000).unwrap();
        assert_eq!(minted.expires_at, 4_600);
        assert_eq!(minted.uid, 7);
        assert_eq!(minted.token, "stub-token");

        let calls = signer.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].expires_at, Some(4_600));
        assert_eq!(
            calls[0].subject,
            Subject::Channel {
                name: minted.channel_name.clone(),
                uid: 7
            }
        );
    }

    #[test]
    fn test_mint_channel_rejects_non_positive_lifetime() {
        let service = service(Arc::new(CapturingSigner::default()));

        for bad in [0, -10] {
            let err = service.mint_channel(None, Some(bad)).unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)));
        }
        assert!(service.registry().is_empty());
    }

    #[test]
    fn test_channel_exists_rejects_missing_name() {
        let service = service(Arc::new(CapturingSigner::default()));

        assert!(matches!(
            service.channel_exists(None),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            service.channel_exists(Some("")),
            Err(ServiceError::Validation(_))
        ));
        assert!(!service.channel_exists(Some("channel_1")).unwrap());
    }

    #[test]
    fn test_app_token_uses_configured_ttl() {
        let signer = Arc::new(CapturingSigner::default());
        let service = service(signer.clone()).with_app_token_ttl(120);

        let issued = service.issue_app_token(None).unwrap();
        let expires_at = issued.expires_at.unwrap();
        let now = Utc::now().timestamp();
        assert!(expires_at > now && expires_at <= now + 120);
    }

    #[tokio::test]
    async fn test_create_user_validates_before_checking_identity_api() {
        let service = service(Arc::new(CapturingSigner::default()));

        let err = service.create_user(Some("alice"), None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = service
            .create_user(Some("alice"), Some("pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::IdentityApiUnavailable));
    }
}
