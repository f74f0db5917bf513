use thiserror::Error;

use nitro_core::ClientSafe;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("challenge not found or already consumed")]
    ChallengeNotFound,

    #[error("challenge has expired")]
    ChallengeExpired,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("unsupported token: {0}")]
    UnsupportedAsset(String),

    #[error("expires_at must be in the future")]
    ExpiresInPast,

    #[error("authentication required")]
    Unauthenticated,

    #[error("session key application mismatch")]
    ApplicationMismatch,

    #[error("session key not found or expired")]
    KeyNotFound,

    #[error("operation denied: insufficient session key allowance: {required} required, {available} available")]
    AllowanceExceeded { required: String, available: String },

    #[error("permission denied")]
    PermissionDenied,

    #[error("invalid or expired bearer token")]
    TokenInvalid,

    #[error("{0}")]
    Other(String),
}

impl ClientSafe for AuthError {
    fn is_client_safe(&self) -> bool {
        matches!(
            self,
            AuthError::ChallengeNotFound
                | AuthError::ChallengeExpired
                | AuthError::InvalidSignature
                | AuthError::UnsupportedAsset(_)
                | AuthError::ExpiresInPast
                | AuthError::Unauthenticated
                | AuthError::ApplicationMismatch
                | AuthError::KeyNotFound
                | AuthError::AllowanceExceeded { .. }
                | AuthError::PermissionDenied
                | AuthError::TokenInvalid
        )
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
