//! Shared, process-wide state every connection's dispatch loop reads from.
//! One [`AppState`] is constructed at startup and handed to every connection
//! as an `Arc`.

use std::sync::Arc;

use nitro_auth::{BearerIssuer, ChallengeCache, SessionKeyCache};
use nitro_core::constants::{
    DEFAULT_CHALLENGE_TTL_SECS, DEFAULT_JWT_TTL_SECS, DEFAULT_PROCESS_BUFFER_SIZE,
    DEFAULT_TIMESTAMP_SKEW_SECS, DEFAULT_WRITE_BUFFER_SIZE, DEFAULT_WRITE_TIMEOUT_SECS,
};
use nitro_crypto::LocalSigner;
use nitro_ledger::{Ledger, LedgerDb};

use crate::notifier::Notifier;

/// The subset of node configuration the dispatch/connection layer consults
/// directly. `nitro-node`'s `NodeConfig` builds one of these from CLI flags
/// and environment.
#[derive(Clone, Debug)]
pub struct RpcConfig {
    pub write_timeout_secs: u64,
    pub write_buffer_size: usize,
    pub process_buffer_size: usize,
    pub challenge_ttl_secs: i64,
    pub timestamp_skew_secs: i64,
    pub jwt_ttl_secs: i64,
    pub rpc_history_page_size: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            write_timeout_secs: DEFAULT_WRITE_TIMEOUT_SECS,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            process_buffer_size: DEFAULT_PROCESS_BUFFER_SIZE,
            challenge_ttl_secs: DEFAULT_CHALLENGE_TTL_SECS,
            timestamp_skew_secs: DEFAULT_TIMESTAMP_SKEW_SECS,
            jwt_ttl_secs: DEFAULT_JWT_TTL_SECS,
            rpc_history_page_size: 50,
        }
    }
}

pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub db: Arc<LedgerDb>,
    pub session_keys: SessionKeyCache,
    pub challenges: Arc<ChallengeCache>,
    pub bearer: BearerIssuer,
    pub signer: LocalSigner,
    pub config: RpcConfig,
    pub notifier: Notifier,
}

impl AppState {
    pub fn new(
        ledger: Arc<Ledger>,
        db: Arc<LedgerDb>,
        session_keys: SessionKeyCache,
        challenges: Arc<ChallengeCache>,
        bearer: BearerIssuer,
        signer: LocalSigner,
        config: RpcConfig,
    ) -> Self {
        Self { ledger, db, session_keys, challenges, bearer, signer, config, notifier: Notifier::new() }
    }
}
