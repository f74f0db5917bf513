use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::types::AssetSymbol;

/// A registered asset. Immutable once registered — the registry only ever
/// appends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub symbol: AssetSymbol,
    pub chain_id: u64,
    pub token_address: Address,
    pub decimals: u8,
}
