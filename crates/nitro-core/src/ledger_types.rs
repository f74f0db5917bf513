use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::types::{AccountRef, Amount, AssetSymbol, TimestampSecs};

/// `{id, account_id, account_type, asset_symbol, wallet, credit, debit,
/// session_key?, created_at}`. Entries are written in pairs so that the sum
/// of credits minus debits for a `(account, asset)` equals that account's
/// balance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: u64,
    pub account_id: AccountRef,
    pub asset_symbol: AssetSymbol,
    /// The wallet this entry is ultimately attributable to — for an
    /// app-session account this is the participant the movement concerns;
    /// for a wallet account it is that same wallet.
    pub wallet: Address,
    pub credit: Amount,
    pub debit: Amount,
    /// Stamped on debits made on behalf of a session key, so the spending
    /// tracker can sum usage per `(key, asset)`.
    pub session_key: Option<String>,
    pub created_at: TimestampSecs,
}

impl LedgerEntry {
    pub fn net(&self) -> Amount {
        self.credit - self.debit
    }
}

/// The closed enumeration of ledger transaction kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
    Transfer,
    Deposit,
    Withdrawal,
    AppDeposit,
    AppWithdrawal,
}

/// `{id, tx_type, from_account, to_account, asset_symbol, amount,
/// created_at}`. A summary record; entry pairs remain the source of truth.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: u64,
    pub tx_type: TxType,
    pub from_account: AccountRef,
    pub to_account: AccountRef,
    pub asset_symbol: AssetSymbol,
    pub amount: Amount,
    pub created_at: TimestampSecs,
}
