//! The pending-challenge cache: a short-TTL map from challenge string to
//! the auth request it was issued for. `dashmap` gives lock-free concurrent
//! access without a single coarse `RwLock` around the whole table — the
//! same tradeoff other relayer/bridge services in this retrieval pack make
//! for caches on this kind of hot, short-lived path.

use alloy_primitives::Address;
use dashmap::DashMap;
use uuid::Uuid;

use nitro_core::{AssetSymbol, Allowance, TimestampSecs};

use crate::error::{AuthError, AuthResult};

/// The auth request a challenge was issued against, cached until the
/// client replies with `auth_verify` or the TTL lapses.
#[derive(Clone, Debug)]
pub struct PendingChallenge {
    pub address: Address,
    pub session_key: Address,
    pub application: String,
    pub scope: String,
    pub expires_at: TimestampSecs,
    pub allowances: Vec<Allowance>,
    pub issued_at: TimestampSecs,
}

pub struct ChallengeCache {
    inner: DashMap<String, PendingChallenge>,
    ttl_secs: i64,
}

impl ChallengeCache {
    pub fn new(ttl_secs: i64) -> Self {
        Self { inner: DashMap::new(), ttl_secs }
    }

    /// Validates the request (unsupported assets and past-dated expiry both
    /// fail fast, before a challenge is ever issued), mints a UUIDv4
    /// challenge string, and caches the pending request under it.
    pub fn issue(
        &self,
        address: Address,
        session_key: Address,
        application: String,
        scope: String,
        expires_at: TimestampSecs,
        allowances: Vec<Allowance>,
        known_assets: &[AssetSymbol],
        now: TimestampSecs,
    ) -> AuthResult<String> {
        if expires_at <= now {
            return Err(AuthError::ExpiresInPast);
        }
        for allowance in &allowances {
            if !known_assets.contains(&allowance.asset_symbol) {
                return Err(AuthError::UnsupportedAsset(allowance.asset_symbol.to_string()));
            }
        }
        let challenge = Uuid::new_v4().to_string();
        self.inner.insert(
            challenge.clone(),
            PendingChallenge {
                address,
                session_key,
                application,
                scope,
                expires_at,
                allowances,
                issued_at: now,
            },
        );
        Ok(challenge)
    }

    /// Consumes (removes) a pending challenge, failing if it is missing or
    /// past its TTL.
    pub fn take(&self, challenge: &str, now: TimestampSecs) -> AuthResult<PendingChallenge> {
        let (_, pending) = self.inner.remove(challenge).ok_or(AuthError::ChallengeNotFound)?;
        if now - pending.issued_at > self.ttl_secs {
            return Err(AuthError::ChallengeExpired);
        }
        Ok(pending)
    }

    /// Periodic GC; called from a background sweep task every
    /// `ttl_secs / 4`.
    pub fn sweep_expired(&self, now: TimestampSecs) {
        self.inner.retain(|_, pending| now - pending.issued_at <= self.ttl_secs);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_then_take_round_trips() {
        let cache = ChallengeCache::new(120);
        let assets = vec![AssetSymbol::new("usdc")];
        let challenge = cache
            .issue(
                Address::ZERO,
                Address::repeat_byte(1),
                "TestApp".into(),
                "full".into(),
                1000,
                vec![],
                &assets,
                0,
            )
            .unwrap();
        let pending = cache.take(&challenge, 10).unwrap();
        assert_eq!(pending.application, "TestApp");
        assert!(cache.is_empty());
    }

    #[test]
    fn expired_past_ttl_is_rejected() {
        let cache = ChallengeCache::new(10);
        let assets = vec![];
        let challenge = cache
            .issue(Address::ZERO, Address::ZERO, "app".into(), "s".into(), 1000, vec![], &assets, 0)
            .unwrap();
        let err = cache.take(&challenge, 11).unwrap_err();
        assert!(matches!(err, AuthError::ChallengeExpired));
    }

    #[test]
    fn unsupported_asset_rejected_before_challenge_issued() {
        let cache = ChallengeCache::new(120);
        let assets = vec![AssetSymbol::new("usdc")];
        let allowances = vec![Allowance {
            asset_symbol: AssetSymbol::new("eth"),
            max_amount: nitro_core::Amount::ZERO,
        }];
        let err = cache
            .issue(Address::ZERO, Address::ZERO, "app".into(), "s".into(), 1000, allowances, &assets, 0)
            .unwrap_err();
        assert!(matches!(err, AuthError::UnsupportedAsset(_)));
    }
}
