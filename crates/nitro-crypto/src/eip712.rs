//! Minimal hand-rolled EIP-712 typed-data hashing for the single `Policy`
//! struct the auth challenge signs over. A full `alloy-sol-types`/contract
//! binding dependency would bring in an entire ABI macro stack for one
//! struct, so this builds the domain separator and struct hash directly —
//! the same call the crate makes everywhere else: reach for the minimum
//! slice of the ecosystem a single use needs.

use alloy_primitives::{keccak256, Address, B256, U256};

/// `{asset_symbol, max_amount}` as it appears inside the signed policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyAllowance {
    pub asset_symbol: String,
    pub max_amount: U256,
}

/// The `Policy{challenge, scope, wallet, session_key, expires_at,
/// allowances[]}` typed struct signed during `auth_verify`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Policy {
    pub challenge: String,
    pub scope: String,
    pub wallet: Address,
    pub session_key: Address,
    pub expires_at: i64,
    pub allowances: Vec<PolicyAllowance>,
}

const DOMAIN_NAME: &str = "ClearNode";
const DOMAIN_VERSION: &str = "1";

const ALLOWANCE_TYPE: &[u8] = b"Allowance(string asset_symbol,uint256 max_amount)";
const POLICY_TYPE: &[u8] = b"Policy(string challenge,string scope,address wallet,address session_key,uint256 expires_at,Allowance[] allowances)Allowance(string asset_symbol,uint256 max_amount)";
const DOMAIN_TYPE: &[u8] = b"EIP712Domain(string name,string version)";

fn word_address(a: Address) -> [u8; 32] {
    let mut w = [0u8; 32];
    w[12..].copy_from_slice(a.as_slice());
    w
}

fn domain_separator() -> B256 {
    let type_hash = keccak256(DOMAIN_TYPE);
    let name_hash = keccak256(DOMAIN_NAME.as_bytes());
    let version_hash = keccak256(DOMAIN_VERSION.as_bytes());
    let mut buf = Vec::with_capacity(96);
    buf.extend_from_slice(type_hash.as_slice());
    buf.extend_from_slice(name_hash.as_slice());
    buf.extend_from_slice(version_hash.as_slice());
    keccak256(buf)
}

fn hash_allowance(a: &PolicyAllowance) -> B256 {
    let type_hash = keccak256(ALLOWANCE_TYPE);
    let asset_hash = keccak256(a.asset_symbol.as_bytes());
    let mut buf = Vec::with_capacity(96);
    buf.extend_from_slice(type_hash.as_slice());
    buf.extend_from_slice(asset_hash.as_slice());
    buf.extend_from_slice(&a.max_amount.to_be_bytes::<32>());
    keccak256(buf)
}

fn hash_allowances(allowances: &[PolicyAllowance]) -> B256 {
    let mut buf = Vec::with_capacity(allowances.len() * 32);
    for a in allowances {
        buf.extend_from_slice(hash_allowance(a).as_slice());
    }
    keccak256(buf)
}

/// Computes the struct hash, then the final EIP-712 digest
/// `keccak256(0x1901 || domainSeparator || structHash)` — the hash the
/// server expects `auth_verify`'s signature to cover.
pub fn hash_policy(policy: &Policy) -> B256 {
    let type_hash = keccak256(POLICY_TYPE);
    let challenge_hash = keccak256(policy.challenge.as_bytes());
    let scope_hash = keccak256(policy.scope.as_bytes());
    let allowances_hash = hash_allowances(&policy.allowances);
    let expires_at = U256::try_from(policy.expires_at.max(0)).unwrap_or(U256::ZERO);

    let mut struct_buf = Vec::with_capacity(32 * 7);
    struct_buf.extend_from_slice(type_hash.as_slice());
    struct_buf.extend_from_slice(challenge_hash.as_slice());
    struct_buf.extend_from_slice(scope_hash.as_slice());
    struct_buf.extend_from_slice(&word_address(policy.wallet));
    struct_buf.extend_from_slice(&word_address(policy.session_key));
    struct_buf.extend_from_slice(&expires_at.to_be_bytes::<32>());
    struct_buf.extend_from_slice(allowances_hash.as_slice());
    let struct_hash = keccak256(struct_buf);

    let domain = domain_separator();
    let mut digest_buf = Vec::with_capacity(2 + 32 + 32);
    digest_buf.extend_from_slice(&[0x19, 0x01]);
    digest_buf.extend_from_slice(domain.as_slice());
    digest_buf.extend_from_slice(struct_hash.as_slice());
    keccak256(digest_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_for_identical_input() {
        let policy = Policy {
            challenge: "challenge-1".into(),
            scope: "app.example".into(),
            wallet: Address::ZERO,
            session_key: Address::repeat_byte(0x11),
            expires_at: 1_700_000_000,
            allowances: vec![PolicyAllowance {
                asset_symbol: "usdc".into(),
                max_amount: U256::from(100u64),
            }],
        };
        assert_eq!(hash_policy(&policy), hash_policy(&policy));
    }

    #[test]
    fn hash_changes_with_challenge() {
        let base = Policy {
            challenge: "a".into(),
            scope: "app".into(),
            wallet: Address::ZERO,
            session_key: Address::ZERO,
            expires_at: 1,
            allowances: vec![],
        };
        let mut other = base.clone();
        other.challenge = "b".into();
        assert_ne!(hash_policy(&base), hash_policy(&other));
    }
}
