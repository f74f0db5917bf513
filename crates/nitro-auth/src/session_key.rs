//! The process-wide session-key cache. Loaded from the persistent store on
//! boot, updated in lockstep with every write transaction that touches a
//! session key. `parking_lot::RwLock` is used instead of the stdlib lock —
//! no poisoning to thread through, and it's the lock this ecosystem reaches
//! for by default wherever `tokio` itself doesn't need async-aware locking.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::Address;
use parking_lot::RwLock;

use nitro_core::{SessionKey, TimestampSecs};

use crate::error::{AuthError, AuthResult};

#[derive(Clone, Default)]
pub struct SessionKeyCache {
    inner: Arc<RwLock<HashMap<Address, SessionKey>>>,
}

impl SessionKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-loads the cache from the persistent store at startup.
    pub fn load(records: Vec<SessionKey>) -> Self {
        let cache = Self::new();
        {
            let mut guard = cache.inner.write();
            for record in records {
                guard.insert(record.key_address, record);
            }
        }
        cache
    }

    pub fn insert(&self, record: SessionKey) {
        self.inner.write().insert(record.key_address, record);
    }

    pub fn get(&self, key_address: &Address) -> Option<SessionKey> {
        self.inner.read().get(key_address).cloned()
    }

    pub fn keys_for_wallet(&self, wallet: Address) -> Vec<SessionKey> {
        self.inner.read().values().filter(|k| k.wallet == wallet).cloned().collect()
    }

    /// Returns the wallet if `signer` is a currently active session key;
    /// otherwise treats `signer` as a raw wallet address signing for
    /// itself. A registered-but-expired key resolves to `None` — an
    /// explicit revocation must not be bypassable by reusing the key
    /// address as if it had never been registered.
    pub fn get_wallet_by_session_key(&self, signer: Address, now: TimestampSecs) -> Option<Address> {
        match self.get(&signer) {
            Some(record) if record.is_active(now) => Some(record.wallet),
            Some(_) => None,
            None => Some(signer),
        }
    }

    /// Fails unless the key has root scope or its stored application
    /// matches the one requested.
    pub fn validate_application(&self, key: &SessionKey, requested_application: &str) -> AuthResult<()> {
        if key.is_root() || key.application == requested_application {
            Ok(())
        } else {
            Err(AuthError::ApplicationMismatch)
        }
    }

    /// Marks a key revoked by setting `expires_at = now`, mirroring the
    /// write the caller makes to the persistent store in the same
    /// transaction.
    pub fn revoke(&self, key_address: &Address, now: TimestampSecs) -> AuthResult<()> {
        let mut guard = self.inner.write();
        let record = guard.get_mut(key_address).ok_or(AuthError::KeyNotFound)?;
        record.expires_at = now;
        Ok(())
    }

    /// Test-only full reset, mirroring the protocol's `cleanup_session_key_cache`.
    pub fn clear(&self) {
        self.inner.write().clear();
    }
}

/// Revocation permission rule: the wallet may revoke any of its keys; a
/// key may revoke itself; a root-scoped key may revoke any peer key of the
/// same wallet; any other key may only revoke itself.
pub fn can_revoke(actor: Address, actor_record: Option<&SessionKey>, target: &SessionKey) -> bool {
    if actor == target.wallet {
        return true;
    }
    if actor == target.key_address {
        return true;
    }
    if let Some(record) = actor_record {
        if record.is_root() && record.wallet == target.wallet {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(wallet: Address, key_address: Address, application: &str, expires_at: i64) -> SessionKey {
        SessionKey {
            id: "k1".into(),
            wallet,
            key_address,
            application: application.into(),
            scope: "full".into(),
            allowances: vec![],
            expires_at,
            created_at: 0,
        }
    }

    #[test]
    fn unregistered_signer_is_treated_as_its_own_wallet() {
        let cache = SessionKeyCache::new();
        let addr = Address::repeat_byte(9);
        assert_eq!(cache.get_wallet_by_session_key(addr, 0), Some(addr));
    }

    #[test]
    fn active_session_key_resolves_to_wallet() {
        let cache = SessionKeyCache::new();
        let wallet = Address::repeat_byte(1);
        let signer = Address::repeat_byte(2);
        cache.insert(key(wallet, signer, "App", 1_000));
        assert_eq!(cache.get_wallet_by_session_key(signer, 0), Some(wallet));
    }

    #[test]
    fn expired_session_key_resolves_to_none() {
        let cache = SessionKeyCache::new();
        let wallet = Address::repeat_byte(1);
        let signer = Address::repeat_byte(2);
        cache.insert(key(wallet, signer, "App", 10));
        assert_eq!(cache.get_wallet_by_session_key(signer, 100), None);
    }

    #[test]
    fn revocation_rules() {
        let wallet = Address::repeat_byte(1);
        let other_wallet = Address::repeat_byte(2);
        let target = key(wallet, Address::repeat_byte(3), "App", 1_000);
        let root = key(wallet, Address::repeat_byte(4), "clearnode", 1_000);
        let unrelated = key(other_wallet, Address::repeat_byte(5), "App", 1_000);

        assert!(can_revoke(wallet, None, &target));
        assert!(can_revoke(target.key_address, None, &target));
        assert!(can_revoke(root.key_address, Some(&root), &target));
        assert!(!can_revoke(unrelated.key_address, Some(&unrelated), &target));
    }
}
