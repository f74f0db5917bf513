use std::fmt;

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Exact decimal amount — never a float. Ledger balances, allowances and
/// allocations are all expressed in this type.
pub type Amount = rust_decimal::Decimal;

/// Unix timestamp in milliseconds since epoch, as carried on the wire.
pub type TimestampMs = u64;

/// Unix timestamp in seconds, used for `expires_at`/`created_at` fields that
/// mirror on-chain/off-chain conventions elsewhere in this codebase.
pub type TimestampSecs = i64;

/// A user-facing asset ticker, e.g. `"usdc"`. Case is preserved as received;
/// comparisons are exact-match (the registry is the single source of truth
/// for which symbols exist).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetSymbol(pub String);

impl AssetSymbol {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for AssetSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetSymbol({})", self.0)
    }
}

impl From<&str> for AssetSymbol {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AssetSymbol {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A ledger account is either a wallet (keyed by its Ethereum address) or an
/// app session (keyed by its session id). Both kinds share one ledger key
/// space so entries can be written against either without special-casing.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountRef {
    Wallet(Address),
    AppSession(B256),
}

impl AccountRef {
    /// Canonical byte encoding used as the ledger's sled key prefix: one
    /// discriminant byte followed by the 20- or 32-byte identifier.
    pub fn to_key_bytes(&self) -> Vec<u8> {
        match self {
            AccountRef::Wallet(addr) => {
                let mut v = Vec::with_capacity(21);
                v.push(0u8);
                v.extend_from_slice(addr.as_slice());
                v
            }
            AccountRef::AppSession(sid) => {
                let mut v = Vec::with_capacity(33);
                v.push(1u8);
                v.extend_from_slice(sid.as_slice());
                v
            }
        }
    }

    pub fn from_key_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        match bytes.split_first() {
            Some((0, rest)) if rest.len() == 20 => Ok(AccountRef::Wallet(Address::from_slice(rest))),
            Some((1, rest)) if rest.len() == 32 => {
                Ok(AccountRef::AppSession(B256::from_slice(rest)))
            }
            _ => Err(CoreError::Malformed(
                "invalid account reference encoding".into(),
            )),
        }
    }

    pub fn as_wallet(&self) -> Option<Address> {
        match self {
            AccountRef::Wallet(addr) => Some(*addr),
            AccountRef::AppSession(_) => None,
        }
    }

    pub fn is_wallet(&self) -> bool {
        matches!(self, AccountRef::Wallet(_))
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountRef::Wallet(a) => write!(f, "{a}"),
            AccountRef::AppSession(s) => write!(f, "{s}"),
        }
    }
}

impl fmt::Debug for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountRef::Wallet(a) => write!(f, "AccountRef::Wallet({a})"),
            AccountRef::AppSession(s) => write!(f, "AccountRef::AppSession({s})"),
        }
    }
}

/// Parse a `0x…`-prefixed hex address, mapping malformed input to a
/// client-safe `CoreError`.
pub fn parse_address(s: &str) -> Result<Address, CoreError> {
    s.parse::<Address>()
        .map_err(|e| CoreError::InvalidAddress(format!("{s}: {e}")))
}

/// Parse a `0x…`-prefixed 32-byte hash (session id, challenge digest, etc.).
pub fn parse_b256(s: &str) -> Result<B256, CoreError> {
    s.parse::<B256>()
        .map_err(|e| CoreError::Malformed(format!("{s}: {e}")))
}
