use thiserror::Error;

use nitro_core::CoreError;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Codec(#[from] CoreError),

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("connection closed")]
    Closed,
}

pub type SdkResult<T> = Result<T, SdkError>;
