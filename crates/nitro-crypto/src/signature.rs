use std::fmt;

use crate::error::CryptoError;

/// A 65-byte `r || s || v` ECDSA signature, `v ∈ {27, 28}`. Hex-encoded with
/// no `0x` prefix on the wire, matching spec §6.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub v: u8,
}

impl Signature {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 65 {
            return Err(CryptoError::WrongLength(bytes.len()));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[0..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(Self { r, s, v: bytes[64] })
    }

    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[0..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.v;
        out
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s.trim_start_matches("0x"))?;
        Self::from_bytes(&bytes)
    }

    /// Normalizes a recovery id (0/1 or 27/28) to the on-wire `v ∈ {27,28}`.
    pub fn normalize_v(raw: u8) -> u8 {
        if raw >= 27 { raw } else { raw + 27 }
    }

    /// `v` translated back to the 0/1 recovery id `k256` expects.
    pub fn recovery_id(&self) -> u8 {
        if self.v >= 27 { self.v - 27 } else { self.v }
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}…, v={})", &self.to_hex()[..16], self.v)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
