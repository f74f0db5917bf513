//! ECDSA-over-Keccak256 signing/recovery ("plain" mode) and the EIP-712-style
//! typed-data hash used only by the auth challenge ("typed" mode). Grounded
//! on the recover-from-prehash pattern already present in this retrieval
//! pack's payment-verification crate.

pub mod eip712;
pub mod error;
pub mod signature;
pub mod signer;

pub use eip712::{hash_policy, Policy, PolicyAllowance};
pub use error::{CryptoError, CryptoResult};
pub use signature::Signature;
pub use signer::{recover, LocalSigner, Signer};
