//! # Chanmint Token
//!
//! Token signing and issuance for chanmint.
//!
//! The crate is split along one seam: a [`Signer`] turns a [`SigningRequest`]
//! into an opaque token string, and the [`TokenIssuer`] façade validates caller
//! input, fills in defaults and delegates to whichever signer it was built
//! with. [`BiscuitSigner`] is the built-in signer; it keys biscuit tokens with
//! the application certificate.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use chanmint_token::{AppCredentials, BiscuitSigner, TokenIssuer};
//!
//! fn main() -> Result<(), chanmint_token::TokenError> {
//!     let credentials = AppCredentials::new("demo-app", include_str!("../tests/app_key.pem"));
//!     let issuer = TokenIssuer::new(Arc::new(BiscuitSigner::new()));
//!
//!     let issued = issuer.issue_join_token(&credentials, "channel_123456", None, None, None)?;
//!     println!("token expires at {:?}", issued.expires_at);
//!     Ok(())
//! }
//! ```

mod error;
mod issuer;
mod mint;
mod signer;
mod verify;

pub use error::TokenError;
pub use issuer::{IssuedToken, TokenIssuer};
pub use mint::{keypair_from_certificate, BiscuitSigner};
pub use signer::{
    AppCredentials, ChannelRole, IdentityRole, Privilege, Signer, SigningRequest, Subject,
    DEFAULT_UID,
};
pub use verify::{
    biscuit_key_from_string, inspect_token, public_key_from_certificate, public_key_to_string,
    verify_identity_token, verify_join_token, TokenClaims,
};

pub use chanmint_config::ExpiryPolicy;

// Re-export biscuit types that are needed for public API
pub use biscuit_auth::{KeyPair, PublicKey};
