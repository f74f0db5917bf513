use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::constants::ROOT_APPLICATION;
use crate::types::{Amount, AssetSymbol, TimestampSecs};

/// A single `{asset_symbol, max_amount}` cap inside a session key's policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Allowance {
    pub asset_symbol: AssetSymbol,
    pub max_amount: Amount,
}

/// `{id, wallet, key_address, application, scope, allowances[], expires_at,
/// created_at}`. Spend-to-date is derived, never stored on this record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionKey {
    pub id: String,
    pub wallet: Address,
    pub key_address: Address,
    pub application: String,
    pub scope: String,
    pub allowances: Vec<Allowance>,
    pub expires_at: TimestampSecs,
    pub created_at: TimestampSecs,
}

impl SessionKey {
    /// A root-scoped key (`application == "clearnode"`) bypasses both
    /// allowance and application checks.
    pub fn is_root(&self) -> bool {
        self.application == ROOT_APPLICATION
    }

    pub fn is_active(&self, now: TimestampSecs) -> bool {
        self.expires_at > now
    }

    pub fn allowance_for(&self, asset: &AssetSymbol) -> Amount {
        self.allowances
            .iter()
            .find(|a| &a.asset_symbol == asset)
            .map(|a| a.max_amount)
            .unwrap_or(Amount::ZERO)
    }

    pub fn has_allowance_entry(&self, asset: &AssetSymbol) -> bool {
        self.allowances.iter().any(|a| &a.asset_symbol == asset)
    }
}
