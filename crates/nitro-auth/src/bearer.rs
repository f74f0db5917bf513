//! Bearer re-authentication. Issues and verifies a JWT-like token whose
//! claims mirror the session key's policy, signed by the node rather than
//! by a key format `jsonwebtoken` doesn't ship (ES256K) — HS256 with a
//! server-held secret is the simplest path that still satisfies "signed by
//! the node"; see the grounding ledger for the tradeoff.

use alloy_primitives::Address;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use nitro_core::{Allowance, TimestampSecs};

use crate::error::{AuthError, AuthResult};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub wallet: String,
    pub session_key: String,
    pub scope: String,
    pub allowances: Vec<Allowance>,
    pub expires_at: TimestampSecs,
    pub issued_at: TimestampSecs,
    /// Required by `jsonwebtoken`'s expiry validation; mirrors `expires_at`.
    pub exp: i64,
}

pub struct BearerIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: i64,
}

impl BearerIssuer {
    pub fn new(secret: &[u8], ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl_secs,
        }
    }

    pub fn issue(
        &self,
        wallet: Address,
        session_key: Address,
        scope: String,
        allowances: Vec<Allowance>,
        expires_at: TimestampSecs,
        now: TimestampSecs,
    ) -> AuthResult<String> {
        let exp = now + self.ttl_secs;
        let claims = Claims {
            wallet: wallet.to_string(),
            session_key: session_key.to_string(),
            scope,
            allowances,
            expires_at,
            issued_at: now,
            exp,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Other(format!("jwt encode failed: {e}")))
    }

    /// Verifies signature and expiry; does not re-check the session key
    /// against the live cache — the caller does that afterward so an
    /// explicit revocation still takes effect before `expires_at`.
    pub fn verify(&self, token: &str, now: TimestampSecs) -> AuthResult<Claims> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| AuthError::TokenInvalid)?;
        if data.claims.expires_at <= now {
            return Err(AuthError::TokenInvalid);
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_then_verify_round_trips() {
        let issuer = BearerIssuer::new(b"test-secret", 3600);
        let token = issuer
            .issue(Address::ZERO, Address::repeat_byte(2), "full".into(), vec![], 10_000, 0)
            .unwrap();
        let claims = issuer.verify(&token, 100).unwrap();
        assert_eq!(claims.wallet, Address::ZERO.to_string());
    }

    #[test]
    fn verify_rejects_past_expiry() {
        let issuer = BearerIssuer::new(b"test-secret", 3600);
        let token = issuer
            .issue(Address::ZERO, Address::ZERO, "full".into(), vec![], 10, 0)
            .unwrap();
        let err = issuer.verify(&token, 100).unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid));
    }
}
