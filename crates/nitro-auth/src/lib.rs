//! The challenge/response auth flow, bearer re-authentication, and the
//! process-wide session-key cache with its spending-cap rules. `nitro-ledger`
//! consumes [`SessionKeyCache`] to resolve signers and enforce allowances
//! against its own ledger entries.

pub mod bearer;
pub mod challenge;
pub mod error;
pub mod resolution;
pub mod session_key;

use std::sync::Arc;
use std::time::Duration;

pub use bearer::{BearerIssuer, Claims};
pub use challenge::{ChallengeCache, PendingChallenge};
pub use error::{AuthError, AuthResult};
pub use resolution::{quorum_weight, resolve_signers, validate_signer_applications, wallet_signed, SignerResolution};
pub use session_key::{can_revoke, SessionKeyCache};

/// Spawns the periodic sweep that purges expired pending challenges, the
/// way a difficulty-retarget task recomputes on its own cadence elsewhere
/// in this workspace.
pub fn spawn_challenge_sweeper(
    cache: Arc<ChallengeCache>,
    challenge_ttl_secs: i64,
) -> tokio::task::JoinHandle<()> {
    let period = Duration::from_secs((challenge_ttl_secs / 4).max(1) as u64);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let now = chrono::Utc::now().timestamp();
            cache.sweep_expired(now);
        }
    })
}
