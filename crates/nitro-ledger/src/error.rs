use thiserror::Error;

use nitro_auth::AuthError;
use nitro_core::{ClientSafe, CoreError};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    // ── Ledger invariants ────────────────────────────────────────────────────
    #[error("insufficient funds: {wallet} for asset {asset}")]
    InsufficientFunds { wallet: String, asset: String },

    #[error("non-zero allocations sum delta")]
    NonZeroSumDelta,

    #[error("negative allocation")]
    NegativeAllocation,

    #[error("non-positive allocations sum delta")]
    NonPositiveSumDelta,

    #[error("allocation references unknown asset {0}")]
    UnknownSessionAsset(String),

    #[error("asset {0} is not deposited into the app session")]
    AssetNotDeposited(String),

    // ── App-session state ────────────────────────────────────────────────────
    #[error("an open app session not found")]
    SessionNotOpen,

    #[error("incorrect version: expected {expected}, got {got}")]
    VersionMismatch { expected: u64, got: u64 },

    #[error("quorum not reached: {have}/{need}")]
    QuorumNotReached { have: u64, need: u64 },

    #[error("incorrect deposit request: depositor signature is required")]
    DepositorSignatureRequired,

    #[error("has challenged channels")]
    ChallengedChannel,

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("unrecognized intent for protocol {0}")]
    UnrecognizedIntent(String),

    #[error("{0}")]
    Other(String),
}

impl ClientSafe for LedgerError {
    fn is_client_safe(&self) -> bool {
        match self {
            LedgerError::Storage(_) | LedgerError::Serialization(_) => false,
            LedgerError::Core(e) => e.is_client_safe(),
            LedgerError::Auth(e) => e.is_client_safe(),
            _ => true,
        }
    }
}

impl From<sled::Error> for LedgerError {
    fn from(e: sled::Error) -> Self {
        LedgerError::Storage(e.to_string())
    }
}

impl From<bincode::Error> for LedgerError {
    fn from(e: bincode::Error) -> Self {
        LedgerError::Serialization(e.to_string())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
