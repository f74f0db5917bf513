//! Maps a request's raw signature set to the identities that produced it,
//! resolving each recovered signer through the session-key cache. This is
//! the shared step every private handler needs before it can check quorum,
//! ownership, or spending caps.

use alloy_primitives::{Address, B256};

use nitro_core::{SessionKey, TimestampSecs};
use nitro_crypto::{recover, Signature};

use crate::error::{AuthError, AuthResult};
use crate::session_key::SessionKeyCache;

/// One recovered signer, resolved to the wallet it signs for. `session_key`
/// is `Some` only when the signature came from a registered, active
/// session key rather than the wallet's own key.
#[derive(Clone, Debug)]
pub struct SignerResolution {
    pub wallet: Address,
    pub session_key: Option<SessionKey>,
}

/// Recovers every signature in `signatures_hex` over `hash` and resolves
/// each to a wallet via `cache`. A signature from an expired, previously
/// registered key contributes nothing (not an error — quorum simply won't
/// count it).
pub fn resolve_signers(
    signatures_hex: &[String],
    hash: B256,
    cache: &SessionKeyCache,
    now: TimestampSecs,
) -> AuthResult<Vec<SignerResolution>> {
    let mut out = Vec::with_capacity(signatures_hex.len());
    for sig_hex in signatures_hex {
        let sig = Signature::from_hex(sig_hex).map_err(|_| AuthError::InvalidSignature)?;
        let signer = recover(hash, &sig).map_err(|_| AuthError::InvalidSignature)?;
        match cache.get(&signer) {
            Some(key) if key.is_active(now) => {
                out.push(SignerResolution { wallet: key.wallet, session_key: Some(key) })
            }
            Some(_) => {}
            None => out.push(SignerResolution { wallet: signer, session_key: None }),
        }
    }
    Ok(out)
}

/// Sums the distinct-participant weight reached by a resolved signer set,
/// counting each wallet at most once even if it signed multiple times or
/// through multiple keys.
pub fn quorum_weight(
    resolutions: &[SignerResolution],
    weight_of: impl Fn(&Address) -> Option<u64>,
) -> u64 {
    let mut seen = std::collections::HashSet::new();
    let mut total = 0u64;
    for r in resolutions {
        if seen.insert(r.wallet) {
            if let Some(w) = weight_of(&r.wallet) {
                total += w;
            }
        }
    }
    total
}

/// Every session-key-based signer in the set must carry the session's
/// application, unless the key has root scope.
pub fn validate_signer_applications(resolutions: &[SignerResolution], application: &str) -> AuthResult<()> {
    for r in resolutions {
        if let Some(key) = &r.session_key {
            if !key.is_root() && key.application != application {
                return Err(AuthError::ApplicationMismatch);
            }
        }
    }
    Ok(())
}

pub fn wallet_signed(resolutions: &[SignerResolution], wallet: Address) -> bool {
    resolutions.iter().any(|r| r.wallet == wallet)
}
