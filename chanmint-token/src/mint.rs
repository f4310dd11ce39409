extern crate biscuit_auth as biscuit;

use biscuit::macros::{biscuit, check, fact};
use biscuit::KeyPair;
use tracing::debug;

use crate::error::TokenError;
use crate::signer::{Signer, SigningRequest, Subject};

/// Signs tokens as biscuits keyed by the application certificate.
///
/// The authority block carries the request as facts:
///
/// ```text
/// app("demo-app");
/// channel("channel_123456");   // or user("alice")
/// uid(0);
/// role("publisher");
/// expires(1700003600);
/// check if time($time), $time < 1700003600;
/// ```
///
/// Tokens without an expiry carry neither the `expires` fact nor the time check.
#[derive(Debug, Default, Clone, Copy)]
pub struct BiscuitSigner;

impl BiscuitSigner {
    pub fn new() -> Self {
        Self
    }
}

/// Parse the application certificate into a signing keypair
pub fn keypair_from_certificate(certificate: &str) -> Result<KeyPair, TokenError> {
    KeyPair::from_private_key_pem(certificate)
        .map_err(|e| TokenError::invalid_key_format(format!("app certificate: {}", e)))
}

impl Signer for BiscuitSigner {
    fn sign(&self, request: &SigningRequest) -> Result<String, TokenError> {
        let keypair = keypair_from_certificate(&request.credentials.app_certificate)?;

        let app_id = request.credentials.app_id.clone();
        let role = request.privilege.as_str().to_string();

        let mut biscuit_builder = match &request.subject {
            Subject::Channel { name, uid } => {
                let channel = name.clone();
                let uid = i64::from(*uid);
                biscuit!(
                    r#"
                        app({app_id});
                        channel({channel});
                        uid({uid});
                        role({role});
                    "#
                )
            }
            Subject::User { user_id } => {
                let user_id = user_id.clone();
                biscuit!(
                    r#"
                        app({app_id});
                        user({user_id});
                        role({role});
                    "#
                )
            }
            Subject::App => biscuit!(
                r#"
                    app({app_id});
                    role({role});
                "#
            ),
        };

        if let Some(expiration) = request.expires_at {
            biscuit_builder = biscuit_builder
                .fact(fact!(r#"expires({expiration})"#))?
                .check(check!(
                    r#"
                        check if time($time), $time < {expiration};
                    "#
                ))?;
        }

        let biscuit = biscuit_builder.build(&keypair)?;
        debug!("biscuit (authority): {}", biscuit);

        Ok(biscuit.to_base64()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::{AppCredentials, ChannelRole, IdentityRole, Privilege};
    use crate::verify::{inspect_token, public_key_from_certificate};

    const APP_KEY: &str = include_str!("../tests/app_key.pem");

    fn credentials() -> AppCredentials {
        AppCredentials::new("demo-app", APP_KEY)
    }

    #[test]
    fn test_sign_channel_token() {
        let request = SigningRequest {
            credentials: credentials(),
            subject: Subject::Channel {
                name: "channel_1".to_string(),
                uid: 42,
            },
            privilege: Privilege::Channel(ChannelRole::Subscriber),
            expires_at: Some(4_102_444_800),
        };

        let token = BiscuitSigner::new().sign(&request).unwrap();
        let public_key = public_key_from_certificate(APP_KEY).unwrap();
        let claims = inspect_token(&token, public_key).unwrap();

        assert_eq!(claims.app_id, "demo-app");
        assert_eq!(claims.channel.as_deref(), Some("channel_1"));
        assert_eq!(claims.uid, Some(42));
        assert_eq!(claims.role, "subscriber");
        assert_eq!(claims.expires_at, Some(4_102_444_800));
    }

    #[test]
    fn test_sign_without_expiry() {
        let request = SigningRequest {
            credentials: credentials(),
            subject: Subject::User {
                user_id: "alice".to_string(),
            },
            privilege: Privilege::Identity(IdentityRole::User),
            expires_at: None,
        };

        let token = BiscuitSigner::new().sign(&request).unwrap();
        let public_key = public_key_from_certificate(APP_KEY).unwrap();
        let claims = inspect_token(&token, public_key).unwrap();

        assert_eq!(claims.user_id.as_deref(), Some("alice"));
        assert_eq!(claims.channel, None);
        assert_eq!(claims.expires_at, None);
    }

    #[test]
    fn test_sign_rejects_malformed_certificate() {
        let request = SigningRequest {
            credentials: AppCredentials::new("demo-app", "not a key"),
            subject: Subject::App,
            privilege: Privilege::Identity(IdentityRole::App),
            expires_at: None,
        };

        let result = BiscuitSigner::new().sign(&request);
        assert!(matches!(result, Err(TokenError::InvalidKeyFormat(_))));
    }
}
