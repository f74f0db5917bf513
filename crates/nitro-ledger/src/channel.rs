use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use nitro_core::AssetSymbol;

/// A minimal on-chain-channel record. The adjudicator contract and
/// deposit/withdrawal settlement are external collaborators; this is only
/// the slice `create_app_session`'s "no open channels in challenged
/// status" precondition and the channel method surface need.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub channel_id: B256,
    pub wallet: Address,
    pub asset_symbol: AssetSymbol,
    pub status: ChannelStatus,
    /// The wallet's per-channel allocation — must be zero for every
    /// channel before the wallet can contribute to a new app session.
    pub allocation: nitro_core::Amount,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Open,
    Challenged,
    Closed,
}

impl Channel {
    pub fn is_challenged(&self) -> bool {
        matches!(self.status, ChannelStatus::Challenged)
    }
}
