//! Plain ECDSA-over-Keccak256 signing and recovery.
//!
//! Deliberately skips the conventional "personal message" prefix so
//! signatures stay chain-agnostic — this is the domain-separation spec.md
//! §4.2 calls "plain" mode, as opposed to the typed-data mode in
//! [`crate::eip712`].

use alloy_primitives::{keccak256, Address, B256};
use k256::ecdsa::{RecoveryId, Signature as K256Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;

use crate::error::CryptoError;
use crate::signature::Signature;

/// Anything capable of signing a 32-byte prehash and reporting the address
/// it signs for. The RPC core only ever depends on this trait, never on a
/// concrete key type — the node's own signer and a session key's signer
/// both implement it.
pub trait Signer: Send + Sync {
    fn address(&self) -> Address;
    fn sign_hash(&self, hash: B256) -> Signature;
}

/// An in-memory ECDSA keypair. The node's own signer and any session-key
/// signer used in tests are both a `LocalSigner`.
pub struct LocalSigner {
    signing_key: SigningKey,
    address: Address,
}

impl LocalSigner {
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        Self::from_signing_key(signing_key)
    }

    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = address_from_verifying_key(signing_key.verifying_key());
        Self { signing_key, address }
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let signing_key = SigningKey::from_bytes(bytes.into())
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        Ok(Self::from_signing_key(signing_key))
    }
}

impl Signer for LocalSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn sign_hash(&self, hash: B256) -> Signature {
        let (sig, recid): (K256Signature, RecoveryId) = self
            .signing_key
            .sign_prehash_recoverable(hash.as_slice())
            .expect("signing a 32-byte prehash cannot fail");
        let bytes = sig.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[0..32]);
        s.copy_from_slice(&bytes[32..64]);
        Signature { r, s, v: Signature::normalize_v(recid.to_byte()) }
    }
}

fn address_from_verifying_key(vk: &VerifyingKey) -> Address {
    let encoded = vk.to_encoded_point(false);
    let hash = keccak256(&encoded.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// Deterministic recovery: the same `(hash, signature)` pair always yields
/// the same address, matching `Verifier.recover`'s contract.
pub fn recover(hash: B256, signature: &Signature) -> Result<Address, CryptoError> {
    let recid = RecoveryId::try_from(signature.recovery_id())
        .map_err(|_| CryptoError::InvalidRecoveryId)?;
    let mut rs = [0u8; 64];
    rs[0..32].copy_from_slice(&signature.r);
    rs[32..64].copy_from_slice(&signature.s);
    let k256_sig = K256Signature::from_slice(&rs)
        .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
    let verifying_key = VerifyingKey::recover_from_prehash(hash.as_slice(), &k256_sig, recid)
        .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
    Ok(address_from_verifying_key(&verifying_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_recover_yields_signer_address() {
        let signer = LocalSigner::generate();
        let hash = keccak256(b"hello clearnode");
        let sig = signer.sign_hash(hash);
        let recovered = recover(hash, &sig).unwrap();
        assert_eq!(recovered, signer.address());
    }

    #[test]
    fn recover_is_deterministic() {
        let signer = LocalSigner::generate();
        let hash = keccak256(b"deterministic");
        let sig = signer.sign_hash(hash);
        let a = recover(hash, &sig).unwrap();
        let b = recover(hash, &sig).unwrap();
        assert_eq!(a, b);
    }
}
