use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("invalid recovery id")]
    InvalidRecoveryId,

    #[error("signature length must be 65 bytes, got {0}")]
    WrongLength(usize),

    #[error("hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
