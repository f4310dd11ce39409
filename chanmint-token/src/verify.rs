extern crate biscuit_auth as biscuit;

use biscuit::macros::authorizer;
use biscuit::Algorithm as Alg;
use biscuit::{Biscuit, PublicKey};
use chrono::Utc;
use serde::Serialize;

use crate::error::TokenError;
use crate::mint::keypair_from_certificate;

/// Claims read back out of a token issued by [`crate::BiscuitSigner`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenClaims {
    pub app_id: String,
    pub channel: Option<String>,
    pub uid: Option<u32>,
    pub user_id: Option<String>,
    pub role: String,
    pub expires_at: Option<i64>,
    pub is_expired: bool,
}

/// Verifies a join token locally for a channel and uid.
///
/// A token bound to uid 0 admits any uid. Expired tokens are rejected.
///
/// # Arguments
///
/// * `token` - Base64 encoded biscuit token
/// * `public_key` - Public half of the app certificate that signed the token
/// * `channel_name` - Channel the bearer wants to join
/// * `uid` - Uid the bearer presents
pub fn verify_join_token(
    token: &str,
    public_key: PublicKey,
    channel_name: &str,
    uid: u32,
) -> Result<(), TokenError> {
    let biscuit = Biscuit::from_base64(token, public_key)?;
    let now = Utc::now().timestamp();
    let channel = channel_name.to_string();
    let uid = i64::from(uid);

    let authz = authorizer!(
        r#"
            time({now});
            allow if channel({channel}), uid({uid});
            allow if channel({channel}), uid(0);
        "#
    );

    if authz.build(&biscuit)?.authorize().is_ok() {
        Ok(())
    } else {
        Err(TokenError::verification_error(
            "Token does not grant access to the channel",
        ))
    }
}

/// Verifies an identity token locally for a user id.
pub fn verify_identity_token(
    token: &str,
    public_key: PublicKey,
    user_id: &str,
) -> Result<(), TokenError> {
    let biscuit = Biscuit::from_base64(token, public_key)?;
    let now = Utc::now().timestamp();
    let user_id = user_id.to_string();

    let authz = authorizer!(
        r#"
            time({now});
            allow if user({user_id});
        "#
    );

    if authz.build(&biscuit)?.authorize().is_ok() {
        Ok(())
    } else {
        Err(TokenError::verification_error(
            "Token does not grant the requested identity",
        ))
    }
}

/// Reads the claims of a token without enforcing its checks.
pub fn inspect_token(token: &str, public_key: PublicKey) -> Result<TokenClaims, TokenError> {
    let biscuit = Biscuit::from_base64(token, public_key)?;
    let now = Utc::now().timestamp();

    let authorizer = authorizer!(
        r#"
            time({now});
            allow if true;
        "#
    );

    let mut authorizer = authorizer.build(&biscuit)?;

    let apps: Vec<(String,)> = authorizer
        .query("data($app) <- app($app)")
        .map_err(|e| TokenError::verification_error(format!("Failed to query app: {e}")))?;
    let channels: Vec<(String,)> = authorizer
        .query("data($channel) <- channel($channel)")
        .map_err(|e| TokenError::verification_error(format!("Failed to query channel: {e}")))?;
    let uids: Vec<(i64,)> = authorizer
        .query("data($uid) <- uid($uid)")
        .map_err(|e| TokenError::verification_error(format!("Failed to query uid: {e}")))?;
    let users: Vec<(String,)> = authorizer
        .query("data($user) <- user($user)")
        .map_err(|e| TokenError::verification_error(format!("Failed to query user: {e}")))?;
    let roles: Vec<(String,)> = authorizer
        .query("data($role) <- role($role)")
        .map_err(|e| TokenError::verification_error(format!("Failed to query role: {e}")))?;
    let expiries: Vec<(i64,)> = authorizer
        .query("data($exp) <- expires($exp)")
        .map_err(|e| TokenError::verification_error(format!("Failed to query expiry: {e}")))?;

    let app_id = apps
        .into_iter()
        .next()
        .map(|(app,)| app)
        .ok_or_else(|| TokenError::verification_error("No app found in token"))?;
    let role = roles
        .into_iter()
        .next()
        .map(|(role,)| role)
        .ok_or_else(|| TokenError::verification_error("No role found in token"))?;
    let uid = match uids.into_iter().next() {
        Some((uid,)) => Some(
            u32::try_from(uid)
                .map_err(|_| TokenError::verification_error(format!("Invalid uid {uid}")))?,
        ),
        None => None,
    };
    let expires_at = expiries.into_iter().next().map(|(exp,)| exp);

    Ok(TokenClaims {
        app_id,
        channel: channels.into_iter().next().map(|(channel,)| channel),
        uid,
        user_id: users.into_iter().next().map(|(user,)| user),
        role,
        expires_at,
        is_expired: expires_at.is_some_and(|exp| exp <= now),
    })
}

/// Derive the verification key from a PEM encoded app certificate
pub fn public_key_from_certificate(certificate: &str) -> Result<PublicKey, TokenError> {
    Ok(keypair_from_certificate(certificate)?.public())
}

/// Render a public key as `ed25519/<hex>`, the format [`biscuit_key_from_string`] reads.
pub fn public_key_to_string(public_key: &PublicKey) -> String {
    format!("ed25519/{}", hex::encode(public_key.to_bytes()))
}

/// Takes a public key encoded as a string in the format "ed25519/..." or "secp256r1/..."
/// and returns a PublicKey.
pub fn biscuit_key_from_string(key: &str) -> Result<PublicKey, TokenError> {
    let (algorithm, hex_key) = key.split_once('/').ok_or_else(|| {
        TokenError::invalid_key_format("Key must be in format 'algorithm/hexkey'")
    })?;

    let alg = match algorithm {
        "ed25519" => Alg::Ed25519,
        "secp256r1" => Alg::Secp256r1,
        _ => {
            return Err(TokenError::invalid_key_format(
                "Unsupported algorithm, must be ed25519 or secp256r1",
            ))
        }
    };

    let key = hex::decode(hex_key)?;

    PublicKey::from_bytes(&key, alg).map_err(|e| TokenError::invalid_key_format(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mint::BiscuitSigner;
    use crate::signer::{
        AppCredentials, ChannelRole, IdentityRole, Privilege, Signer, SigningRequest, Subject,
    };

    const APP_KEY: &str = include_str!("../tests/app_key.pem");

    fn sign(subject: Subject, privilege: Privilege, expires_at: Option<i64>) -> String {
        BiscuitSigner::new()
            .sign(&SigningRequest {
                credentials: AppCredentials::new("demo-app", APP_KEY),
                subject,
                privilege,
                expires_at,
            })
            .unwrap()
    }

    #[test]
    fn test_verify_join_token_for_bound_uid() {
        let token = sign(
            Subject::Channel {
                name: "channel_7".to_string(),
                uid: 7,
            },
            Privilege::Channel(ChannelRole::Publisher),
            Some(Utc::now().timestamp() + 600),
        );
        let public_key = public_key_from_certificate(APP_KEY).unwrap();

        assert!(verify_join_token(&token, public_key, "channel_7", 7).is_ok());
        assert!(verify_join_token(&token, public_key, "channel_7", 8).is_err());
        assert!(verify_join_token(&token, public_key, "channel_8", 7).is_err());
    }

    #[test]
    fn test_verify_join_token_default_uid_admits_anyone() {
        let token = sign(
            Subject::Channel {
                name: "channel_7".to_string(),
                uid: 0,
            },
            Privilege::Channel(ChannelRole::Publisher),
            None,
        );
        let public_key = public_key_from_certificate(APP_KEY).unwrap();

        assert!(verify_join_token(&token, public_key, "channel_7", 1234).is_ok());
    }

    #[test]
    fn test_verify_rejects_expired_token() {
        let token = sign(
            Subject::User {
                user_id: "alice".to_string(),
            },
            Privilege::Identity(IdentityRole::User),
            Some(Utc::now().timestamp() - 1),
        );
        let public_key = public_key_from_certificate(APP_KEY).unwrap();

        assert!(verify_identity_token(&token, public_key, "alice").is_err());
        assert!(inspect_token(&token, public_key).unwrap().is_expired);
    }

    #[test]
    fn test_verify_identity_token() {
        let token = sign(
            Subject::User {
                user_id: "alice".to_string(),
            },
            Privilege::Identity(IdentityRole::User),
            Some(Utc::now().timestamp() + 600),
        );
        let public_key = public_key_from_certificate(APP_KEY).unwrap();

        assert!(verify_identity_token(&token, public_key, "alice").is_ok());
        assert!(verify_identity_token(&token, public_key, "bob").is_err());
    }

    #[test]
    fn test_verify_with_wrong_key_fails() {
        let token = sign(
            Subject::User {
                user_id: "alice".to_string(),
            },
            Privilege::Identity(IdentityRole::User),
            None,
        );
        let other = biscuit_auth::KeyPair::new();

        assert!(verify_identity_token(&token, other.public(), "alice").is_err());
    }

    #[test]
    fn test_public_key_string_round_trip() {
        let public_key = public_key_from_certificate(APP_KEY).unwrap();
        let encoded = public_key_to_string(&public_key);

        assert!(encoded.starts_with("ed25519/"));
        let decoded = biscuit_key_from_string(&encoded).unwrap();
        assert_eq!(decoded.to_bytes(), public_key.to_bytes());

        assert!(biscuit_key_from_string("ed25519").is_err());
        assert!(biscuit_key_from_string("rsa/abcd").is_err());
        assert!(biscuit_key_from_string("ed25519/zz").is_err());
    }
}
