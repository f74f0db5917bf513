//! Pure data types and the wire codec shared by every other crate in this
//! workspace: the payload/envelope codec, asset/session-key/ledger/app-session
//! records, and the protocol constants. Nothing in this crate touches
//! storage, cryptography, or networking — those are the concern of
//! `nitro-crypto`, `nitro-ledger`, `nitro-auth` and `nitro-rpc`.

pub mod app_session;
pub mod asset;
pub mod constants;
pub mod error;
pub mod ledger_types;
pub mod payload;
pub mod session_key;
pub mod types;

pub use app_session::{
    compute_session_id, validate_definition_shape, Allocation, AppSession, AppSessionStatus,
    Intent, NitroRpcVersion,
};
pub use asset::Asset;
pub use error::{ClientSafe, CoreError, CoreResult};
pub use ledger_types::{LedgerEntry, LedgerTransaction, TxType};
pub use payload::{Envelope, Params, Payload, Request, Response};
pub use session_key::{Allowance, SessionKey};
pub use types::{parse_address, parse_b256, AccountRef, Amount, AssetSymbol, TimestampMs, TimestampSecs};
