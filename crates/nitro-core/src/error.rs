use thiserror::Error;

/// Marker for errors whose `Display` message is safe to hand back to a
/// remote peer verbatim. Everything else gets masked behind a generic
/// fallback at the RPC boundary.
pub trait ClientSafe {
    fn is_client_safe(&self) -> bool;
}

#[derive(Debug, Error)]
pub enum CoreError {
    // ── Payload codec ────────────────────────────────────────────────────────
    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("params field `{0}` is required")]
    MissingParam(&'static str),

    #[error("params field `{field}` has the wrong type: {detail}")]
    WrongParamType { field: &'static str, detail: String },

    // ── Identifiers ──────────────────────────────────────────────────────────
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("unknown asset: {0}")]
    UnknownAsset(String),

    // ── Serialization ────────────────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    Other(String),
}

impl ClientSafe for CoreError {
    fn is_client_safe(&self) -> bool {
        matches!(
            self,
            CoreError::Malformed(_)
                | CoreError::MissingParam(_)
                | CoreError::WrongParamType { .. }
                | CoreError::InvalidAddress(_)
                | CoreError::UnknownAsset(_)
        )
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
