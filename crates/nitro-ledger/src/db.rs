use std::path::Path;

use alloy_primitives::{Address, B256};

use nitro_core::{AccountRef, AppSession, Asset, AssetSymbol, LedgerEntry, LedgerTransaction, SessionKey};

use crate::channel::Channel;
use crate::error::LedgerResult;
use crate::history::RpcHistoryRecord;

const SEP: u8 = 0x00;

pub(crate) fn account_asset_prefix(account: &AccountRef, asset: &AssetSymbol) -> Vec<u8> {
    let mut key = account.to_key_bytes();
    key.push(SEP);
    key.extend_from_slice(asset.as_str().as_bytes());
    key.push(SEP);
    key
}

pub(crate) fn session_key_asset_prefix(session_key: &str, asset: &AssetSymbol) -> Vec<u8> {
    let mut key = session_key.as_bytes().to_vec();
    key.push(SEP);
    key.extend_from_slice(asset.as_str().as_bytes());
    key.push(SEP);
    key
}

/// Persistent state database backed by sled. Named trees:
///
///   assets               — symbol bytes                         → bincode(Asset)
///   session_keys         — key_address bytes                    → bincode(SessionKey)
///   ledger_entries       — account‖asset‖id                      → bincode(LedgerEntry)
///   entries_by_session   — session_key‖asset‖id                  → bincode(LedgerEntry)
///   ledger_transactions  — id be bytes                           → bincode(LedgerTransaction)
///   app_sessions         — session_id bytes                      → bincode(AppSession)
///   channels             — channel_id bytes                      → bincode(Channel)
///   rpc_history          — user_id‖rev_id                        → bincode(RpcHistoryRecord)
///   meta                 — utf8 key bytes                        → raw bytes (counters)
pub struct LedgerDb {
    pub(crate) db: sled::Db,
    pub(crate) assets: sled::Tree,
    pub(crate) session_keys: sled::Tree,
    pub(crate) ledger_entries: sled::Tree,
    pub(crate) entries_by_session: sled::Tree,
    pub(crate) ledger_transactions: sled::Tree,
    pub(crate) app_sessions: sled::Tree,
    pub(crate) channels: sled::Tree,
    pub(crate) rpc_history: sled::Tree,
    pub(crate) meta: sled::Tree,
}

impl LedgerDb {
    pub fn open<P: AsRef<Path>>(path: P) -> LedgerResult<Self> {
        let db = sled::open(path)?;
        Ok(Self {
            assets: db.open_tree("assets")?,
            session_keys: db.open_tree("session_keys")?,
            ledger_entries: db.open_tree("ledger_entries")?,
            entries_by_session: db.open_tree("entries_by_session")?,
            ledger_transactions: db.open_tree("ledger_transactions")?,
            app_sessions: db.open_tree("app_sessions")?,
            channels: db.open_tree("channels")?,
            rpc_history: db.open_tree("rpc_history")?,
            meta: db.open_tree("meta")?,
            db,
        })
    }

    pub fn flush(&self) -> LedgerResult<()> {
        self.db.flush()?;
        Ok(())
    }

    // ── Assets ───────────────────────────────────────────────────────────────

    pub fn put_asset(&self, asset: &Asset) -> LedgerResult<()> {
        let bytes = bincode::serialize(asset)?;
        self.assets.insert(asset.symbol.as_str().as_bytes(), bytes)?;
        Ok(())
    }

    pub fn get_asset(&self, symbol: &AssetSymbol) -> LedgerResult<Option<Asset>> {
        match self.assets.get(symbol.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn list_assets(&self) -> LedgerResult<Vec<Asset>> {
        let mut out = Vec::new();
        for item in self.assets.iter() {
            let (_, bytes) = item?;
            out.push(bincode::deserialize(&bytes)?);
        }
        Ok(out)
    }

    // ── Session keys ─────────────────────────────────────────────────────────

    pub fn put_session_key(&self, key: &SessionKey) -> LedgerResult<()> {
        let bytes = bincode::serialize(key)?;
        self.session_keys.insert(key.key_address.as_slice(), bytes)?;
        Ok(())
    }

    pub fn get_session_key(&self, key_address: &Address) -> LedgerResult<Option<SessionKey>> {
        match self.session_keys.get(key_address.as_slice())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn list_session_keys_for_wallet(&self, wallet: Address) -> LedgerResult<Vec<SessionKey>> {
        let mut out = Vec::new();
        for item in self.session_keys.iter() {
            let (_, bytes) = item?;
            let key: SessionKey = bincode::deserialize(&bytes)?;
            if key.wallet == wallet {
                out.push(key);
            }
        }
        Ok(out)
    }

    pub fn list_all_session_keys(&self) -> LedgerResult<Vec<SessionKey>> {
        let mut out = Vec::new();
        for item in self.session_keys.iter() {
            let (_, bytes) = item?;
            out.push(bincode::deserialize(&bytes)?);
        }
        Ok(out)
    }

    // ── Ledger entries ───────────────────────────────────────────────────────

    pub fn next_entry_id(&self) -> LedgerResult<u64> {
        self.next_counter("next_entry_id")
    }

    pub fn next_tx_id(&self) -> LedgerResult<u64> {
        self.next_counter("next_tx_id")
    }

    fn next_counter(&self, key: &str) -> LedgerResult<u64> {
        let current = match self.meta.get(key.as_bytes())? {
            Some(b) => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&b);
                u64::from_be_bytes(arr)
            }
            None => 1,
        };
        self.meta.insert(key.as_bytes(), &(current + 1).to_be_bytes())?;
        Ok(current)
    }

    pub fn put_entry(&self, entry: &LedgerEntry) -> LedgerResult<()> {
        let bytes = bincode::serialize(entry)?;
        let mut key = account_asset_prefix(&entry.account_id, &entry.asset_symbol);
        key.extend_from_slice(&entry.id.to_be_bytes());
        self.ledger_entries.insert(key, bytes.clone())?;

        if let Some(session_key) = &entry.session_key {
            let mut sk_key = session_key_asset_prefix(session_key, &entry.asset_symbol);
            sk_key.extend_from_slice(&entry.id.to_be_bytes());
            self.entries_by_session.insert(sk_key, bytes)?;
        }
        Ok(())
    }

    pub fn entries_for_account_asset(
        &self,
        account: &AccountRef,
        asset: &AssetSymbol,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        let prefix = account_asset_prefix(account, asset);
        let mut out = Vec::new();
        for item in self.ledger_entries.scan_prefix(prefix) {
            let (_, bytes) = item?;
            out.push(bincode::deserialize(&bytes)?);
        }
        Ok(out)
    }

    /// Like [`Self::entries_for_account_asset`], filtered to entries stamped
    /// with `wallet`. An app-session account holds every participant's
    /// balance under one key, so this is the only way to isolate one
    /// participant's share of it.
    pub fn entries_for_account_asset_wallet(
        &self,
        account: &AccountRef,
        asset: &AssetSymbol,
        wallet: Address,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        Ok(self
            .entries_for_account_asset(account, asset)?
            .into_iter()
            .filter(|e| e.wallet == wallet)
            .collect())
    }

    pub fn entries_for_account(&self, account: &AccountRef) -> LedgerResult<Vec<LedgerEntry>> {
        let prefix = account.to_key_bytes();
        let mut out = Vec::new();
        for item in self.ledger_entries.scan_prefix(prefix) {
            let (_, bytes) = item?;
            out.push(bincode::deserialize(&bytes)?);
        }
        Ok(out)
    }

    pub fn entries_for_session_key_asset(
        &self,
        session_key: &str,
        asset: &AssetSymbol,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        let prefix = session_key_asset_prefix(session_key, asset);
        let mut out = Vec::new();
        for item in self.entries_by_session.scan_prefix(prefix) {
            let (_, bytes) = item?;
            out.push(bincode::deserialize(&bytes)?);
        }
        Ok(out)
    }

    // ── Ledger transactions ──────────────────────────────────────────────────

    pub fn put_transaction(&self, tx: &LedgerTransaction) -> LedgerResult<()> {
        let bytes = bincode::serialize(tx)?;
        self.ledger_transactions.insert(tx.id.to_be_bytes(), bytes)?;
        Ok(())
    }

    pub fn list_transactions(&self) -> LedgerResult<Vec<LedgerTransaction>> {
        let mut out = Vec::new();
        for item in self.ledger_transactions.iter() {
            let (_, bytes) = item?;
            out.push(bincode::deserialize(&bytes)?);
        }
        Ok(out)
    }

    // ── App sessions ──────────────────────────────────────────────────────────

    pub fn put_app_session(&self, session: &AppSession) -> LedgerResult<()> {
        let bytes = bincode::serialize(session)?;
        self.app_sessions.insert(session.session_id.as_slice(), bytes)?;
        Ok(())
    }

    pub fn get_app_session(&self, session_id: &B256) -> LedgerResult<Option<AppSession>> {
        match self.app_sessions.get(session_id.as_slice())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn list_app_sessions(&self) -> LedgerResult<Vec<AppSession>> {
        let mut out = Vec::new();
        for item in self.app_sessions.iter() {
            let (_, bytes) = item?;
            out.push(bincode::deserialize(&bytes)?);
        }
        Ok(out)
    }

    // ── Channels ─────────────────────────────────────────────────────────────

    pub fn put_channel(&self, channel: &Channel) -> LedgerResult<()> {
        let bytes = bincode::serialize(channel)?;
        self.channels.insert(channel.channel_id.as_slice(), bytes)?;
        Ok(())
    }

    pub fn get_channel(&self, channel_id: &B256) -> LedgerResult<Option<Channel>> {
        match self.channels.get(channel_id.as_slice())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn list_channels_for_wallet(&self, wallet: Address) -> LedgerResult<Vec<Channel>> {
        let mut out = Vec::new();
        for item in self.channels.iter() {
            let (_, bytes) = item?;
            let channel: Channel = bincode::deserialize(&bytes)?;
            if channel.wallet == wallet {
                out.push(channel);
            }
        }
        Ok(out)
    }

    // ── RPC history ──────────────────────────────────────────────────────────

    pub fn record_rpc_history(&self, record: &RpcHistoryRecord) -> LedgerResult<()> {
        let bytes = bincode::serialize(record)?;
        let mut key = record.user_id.as_slice().to_vec();
        // Reverse-order id suffix so a forward scan yields newest-first.
        key.extend_from_slice(&(u64::MAX - record.id).to_be_bytes());
        self.rpc_history.insert(key, bytes)?;
        Ok(())
    }

    pub fn next_rpc_history_id(&self) -> LedgerResult<u64> {
        self.next_counter("next_rpc_history_id")
    }

    pub fn list_rpc_history(
        &self,
        user_id: Address,
        page_size: usize,
    ) -> LedgerResult<Vec<RpcHistoryRecord>> {
        let mut out = Vec::new();
        for item in self.rpc_history.scan_prefix(user_id.as_slice()) {
            if out.len() >= page_size {
                break;
            }
            let (_, bytes) = item?;
            out.push(bincode::deserialize(&bytes)?);
        }
        Ok(out)
    }
}
