//! The RPC-boundary error type. Every lower-crate error arrives here via
//! `#[from]`; [`RpcError::is_client_safe`] decides whether [`crate::context::Context::fail`]
//! echoes its message verbatim or falls back to a generic one.

use thiserror::Error;

use nitro_auth::AuthError;
use nitro_core::{ClientSafe, CoreError};
use nitro_crypto::CryptoError;
use nitro_ledger::LedgerError;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("cryptographic operation failed")]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("timestamp outside the accepted skew window")]
    TimestampOutOfRange,

    #[error("malformed frame: {0}")]
    MalformedFrame(String),
}

impl ClientSafe for RpcError {
    fn is_client_safe(&self) -> bool {
        match self {
            RpcError::Core(e) => e.is_client_safe(),
            RpcError::Auth(e) => e.is_client_safe(),
            RpcError::Ledger(e) => e.is_client_safe(),
            RpcError::Crypto(_) => false,
            RpcError::UnknownMethod(_) | RpcError::TimestampOutOfRange | RpcError::MalformedFrame(_) => true,
        }
    }
}

pub type RpcResult<T> = Result<T, RpcError>;
