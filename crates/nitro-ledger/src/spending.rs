//! Session-key spend tracking: usage is derived from ledger entries, never
//! stored as a running counter, so it can never drift from the entries
//! that are its source of truth.

use nitro_auth::{AuthError, AuthResult};
use nitro_core::{Amount, AssetSymbol, SessionKey};

use crate::db::LedgerDb;
use crate::error::LedgerResult;

/// Sums all debit entries stamped with `key.id` for `asset`.
pub fn calculate_spending(db: &LedgerDb, key: &SessionKey, asset: &AssetSymbol) -> LedgerResult<Amount> {
    let entries = db.entries_for_session_key_asset(&key.id, asset)?;
    Ok(entries.iter().map(|e| e.debit).sum())
}

/// Fails if spending `amount` more would push usage past the key's
/// allowance, or if the asset isn't in the key's allowance list at all.
/// Root-scoped keys bypass this check entirely.
pub fn validate_spending(
    db: &LedgerDb,
    key: &SessionKey,
    asset: &AssetSymbol,
    amount: Amount,
) -> AuthResult<()> {
    if key.is_root() {
        return Ok(());
    }
    if !key.has_allowance_entry(asset) {
        return Err(AuthError::UnsupportedAsset(asset.to_string()));
    }
    let used = calculate_spending(db, key, asset)
        .map_err(|e| AuthError::Other(e.to_string()))?;
    let allowance = key.allowance_for(asset);
    if used + amount > allowance {
        return Err(AuthError::AllowanceExceeded {
            required: (used + amount).to_string(),
            available: allowance.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;
    use nitro_core::{AccountRef, Allowance, LedgerEntry};
    use proptest::prelude::*;

    fn open_test_db() -> LedgerDb {
        let dir = tempfile::tempdir().unwrap();
        LedgerDb::open(dir.path()).unwrap()
    }

    fn test_key(allowance: Amount) -> SessionKey {
        SessionKey {
            id: "key-1".into(),
            wallet: Address::repeat_byte(1),
            key_address: Address::repeat_byte(2),
            application: "TestApp".into(),
            scope: "full".into(),
            allowances: vec![Allowance { asset_symbol: AssetSymbol::new("usdc"), max_amount: allowance }],
            expires_at: 10_000,
            created_at: 0,
        }
    }

    #[test]
    fn spending_sums_debits_stamped_with_key() {
        let db = open_test_db();
        let key = test_key(Amount::from(100));
        let entry = LedgerEntry {
            id: 1,
            account_id: AccountRef::Wallet(key.wallet),
            asset_symbol: AssetSymbol::new("usdc"),
            wallet: key.wallet,
            credit: Amount::ZERO,
            debit: Amount::from(40),
            session_key: Some(key.id.clone()),
            created_at: 0,
        };
        db.put_entry(&entry).unwrap();
        let spent = calculate_spending(&db, &key, &AssetSymbol::new("usdc")).unwrap();
        assert_eq!(spent, Amount::from(40));
    }

    #[test]
    fn validate_spending_rejects_over_allowance() {
        let db = open_test_db();
        let key = test_key(Amount::from(100));
        let asset = AssetSymbol::new("usdc");
        let entry = LedgerEntry {
            id: 1,
            account_id: AccountRef::Wallet(key.wallet),
            asset_symbol: asset.clone(),
            wallet: key.wallet,
            credit: Amount::ZERO,
            debit: Amount::from(100),
            session_key: Some(key.id.clone()),
            created_at: 0,
        };
        db.put_entry(&entry).unwrap();
        let err = validate_spending(&db, &key, &asset, Amount::from(1)).unwrap_err();
        assert!(matches!(err, AuthError::AllowanceExceeded { .. }));
    }

    #[test]
    fn validate_spending_rejects_unsupported_asset() {
        let db = open_test_db();
        let key = test_key(Amount::from(100));
        let err = validate_spending(&db, &key, &AssetSymbol::new("eth"), Amount::from(1)).unwrap_err();
        assert!(matches!(err, AuthError::UnsupportedAsset(_)));
    }

    proptest! {
        /// Whatever sequence of spend attempts a key is offered, entries
        /// only ever get written for attempts `validate_spending` accepted —
        /// so the sum of debits stamped with (key, asset) can never exceed
        /// the key's allowance over its lifetime.
        #[test]
        fn lifetime_spend_never_exceeds_allowance(
            allowance in 0i64..1000,
            attempts in proptest::collection::vec(0i64..200, 0..20),
        ) {
            let db = open_test_db();
            let key = test_key(Amount::from(allowance));
            let asset = AssetSymbol::new("usdc");

            let mut next_id = 1u64;
            for amount in attempts {
                let amount = Amount::from(amount);
                if validate_spending(&db, &key, &asset, amount).is_ok() {
                    let entry = LedgerEntry {
                        id: next_id,
                        account_id: AccountRef::Wallet(key.wallet),
                        asset_symbol: asset.clone(),
                        wallet: key.wallet,
                        credit: Amount::ZERO,
                        debit: amount,
                        session_key: Some(key.id.clone()),
                        created_at: 0,
                    };
                    db.put_entry(&entry).unwrap();
                    next_id += 1;
                }
            }

            let spent = calculate_spending(&db, &key, &asset).unwrap();
            prop_assert!(spent <= Amount::from(allowance));
        }
    }
}
