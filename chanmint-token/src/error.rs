use thiserror::Error;

/// Errors raised while signing, issuing or verifying tokens
#[derive(Error, Debug)]
pub enum TokenError {
    /// A required input was missing or unusable
    #[error("Validation error: {0}")]
    Validation(String),

    /// The signer rejected the request or failed internally
    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Biscuit error: {0}")]
    BiscuitError(#[from] biscuit_auth::error::Token),

    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("Verification error: {0}")]
    VerificationError(String),

    #[error("Hex decoding error: {0}")]
    HexError(#[from] hex::FromHexError),

    #[error("{0}")]
    Generic(String),
}

impl TokenError {
    pub fn validation(msg: impl Into<String>) -> Self {
        TokenError::Validation(msg.into())
    }

    pub fn signing(msg: impl Into<String>) -> Self {
        TokenError::Signing(msg.into())
    }

    pub fn invalid_key_format(msg: impl Into<String>) -> Self {
        TokenError::InvalidKeyFormat(msg.into())
    }

    pub fn verification_error(msg: impl Into<String>) -> Self {
        TokenError::VerificationError(msg.into())
    }

    pub fn generic(msg: impl Into<String>) -> Self {
        TokenError::Generic(msg.into())
    }

    /// True when the error was caused by caller input rather than the signer
    pub fn is_validation(&self) -> bool {
        matches!(self, TokenError::Validation(_))
    }
}
