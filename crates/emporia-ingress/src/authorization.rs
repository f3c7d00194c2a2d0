//! Delegation checks for offered programs.
//!
//! A program may act for an account only if:
//! 1. the account is not the market's house account
//! 2. the submitter declared the account when it entered the round
//! 3. the program carries a delegation for the account
//! 4. the delegation names the submitter and this market
//! 5. the delegation has not expired
//! 6. the account exists and the signature verifies against its holder key
//!
//! The first failing check rejects the whole program with an `AuthError`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, VerifyingKey};
use emporia_ledger::Ledger;
use emporia_types::{AccountId, Delegation, EmporiaError, MarketName, Program, Result};

/// Checks programs against a market's ledger.
pub struct AuthorizationValidator<'a> {
    market: &'a MarketName,
    ledger: &'a Ledger,
}

impl<'a> AuthorizationValidator<'a> {
    #[must_use]
    pub fn new(market: &'a MarketName, ledger: &'a Ledger) -> Self {
        Self { market, ledger }
    }

    /// Authorize every account `program` claims.
    ///
    /// `authority` is the account list the submitter declared at ENTER.
    pub fn authorize(
        &self,
        program: &Program,
        authority: &BTreeSet<AccountId>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        for account in &program.accounts {
            if *account == self.ledger.house() {
                return Err(EmporiaError::DelegationMismatch {
                    account: *account,
                    reason: "the house account cannot be delegated".into(),
                });
            }
            if !authority.contains(account) {
                return Err(EmporiaError::DelegationMismatch {
                    account: *account,
                    reason: "account was not declared at ENTER".into(),
                });
            }
            let delegation = program
                .delegation_for(account)
                .ok_or(EmporiaError::AccountNotDelegated { account: *account })?;
            if delegation.delegate != program.submitter {
                return Err(EmporiaError::DelegationMismatch {
                    account: *account,
                    reason: format!("issued to {}", delegation.delegate),
                });
            }
            if delegation.market != *self.market {
                return Err(EmporiaError::DelegationMismatch {
                    account: *account,
                    reason: format!("issued for market {}", delegation.market),
                });
            }
            if delegation.is_expired_at(now) {
                return Err(EmporiaError::DelegationExpired { account: *account });
            }
            let holder_key = self
                .ledger
                .holder_key(account)
                .ok_or(EmporiaError::UnknownAccount(*account))?;
            verify_delegation(delegation, &holder_key)?;
        }
        Ok(())
    }
}

/// Verify a delegation's signature against the holder's verifying key.
///
/// Uses strict verification, so small-order keys such as all-zero bytes
/// never validate anything.
pub fn verify_delegation(delegation: &Delegation, holder_key: &[u8; 32]) -> Result<()> {
    let invalid = || EmporiaError::DelegationSignatureInvalid {
        account: delegation.account,
    };
    let key = VerifyingKey::from_bytes(holder_key).map_err(|_| invalid())?;
    let signature = Signature::from_slice(&delegation.signature).map_err(|_| invalid())?;
    key.verify_strict(&delegation.signing_payload(), &signature)
        .map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use emporia_types::program::test_helpers::{delegation, holder_keypair};
    use emporia_types::{EpochId, ErrorKind, ProgramSubmission, TraderId};

    use super::*;

    struct Fixture {
        market: MarketName,
        ledger: Ledger,
        account: AccountId,
        key: ed25519_dalek::SigningKey,
        trader: TraderId,
    }

    fn fixture() -> Fixture {
        let market = MarketName::new("M");
        let mut ledger = Ledger::new(AccountId::from_bytes([0; 16]), [0; 32]);
        let (key, public) = holder_keypair();
        let account = AccountId::new();
        ledger.open_account(account, public).unwrap();
        Fixture {
            market,
            ledger,
            account,
            key,
            trader: TraderId::new(),
        }
    }

    fn program(f: &Fixture, delegations: Vec<Delegation>) -> Program {
        Program::from_submission(
            &f.market,
            EpochId(1),
            0,
            f.trader,
            ProgramSubmission {
                code: "1 .".into(),
                accounts: vec![f.account],
                delegations,
            },
        )
    }

    fn check(f: &Fixture, p: &Program) -> Result<()> {
        let authority = BTreeSet::from([f.account]);
        AuthorizationValidator::new(&f.market, &f.ledger).authorize(p, &authority, Utc::now())
    }

    #[test]
    fn valid_delegation_passes() {
        let f = fixture();
        let p = program(&f, vec![delegation(&f.key, f.account, f.trader, &f.market)]);
        check(&f, &p).unwrap();
    }

    #[test]
    fn missing_delegation_rejected() {
        let f = fixture();
        let p = program(&f, vec![]);
        let err = check(&f, &p).unwrap_err();
        assert!(matches!(err, EmporiaError::AccountNotDelegated { .. }));
        assert_eq!(err.kind(), ErrorKind::AuthError);
    }

    #[test]
    fn wrong_delegate_rejected() {
        let f = fixture();
        let p = program(&f, vec![delegation(&f.key, f.account, TraderId::new(), &f.market)]);
        assert!(matches!(
            check(&f, &p),
            Err(EmporiaError::DelegationMismatch { .. })
        ));
    }

    #[test]
    fn wrong_market_rejected() {
        let f = fixture();
        let p = program(
            &f,
            vec![delegation(&f.key, f.account, f.trader, &MarketName::new("other"))],
        );
        assert!(matches!(
            check(&f, &p),
            Err(EmporiaError::DelegationMismatch { .. })
        ));
    }

    #[test]
    fn expired_delegation_rejected() {
        let f = fixture();
        let d = Delegation::sign(
            &f.key,
            f.account,
            f.trader,
            f.market.clone(),
            Utc::now() - chrono::Duration::seconds(1),
        );
        let p = program(&f, vec![d]);
        assert!(matches!(
            check(&f, &p),
            Err(EmporiaError::DelegationExpired { .. })
        ));
    }

    #[test]
    fn signature_by_wrong_key_rejected() {
        let f = fixture();
        let (other, _) = holder_keypair();
        let p = program(&f, vec![delegation(&other, f.account, f.trader, &f.market)]);
        assert!(matches!(
            check(&f, &p),
            Err(EmporiaError::DelegationSignatureInvalid { .. })
        ));
    }

    #[test]
    fn tampered_expiry_rejected() {
        let f = fixture();
        let mut d = delegation(&f.key, f.account, f.trader, &f.market);
        d.expires_at += chrono::Duration::days(365);
        let p = program(&f, vec![d]);
        assert!(matches!(
            check(&f, &p),
            Err(EmporiaError::DelegationSignatureInvalid { .. })
        ));
    }

    #[test]
    fn undeclared_account_rejected() {
        let f = fixture();
        let p = program(&f, vec![delegation(&f.key, f.account, f.trader, &f.market)]);
        let err = AuthorizationValidator::new(&f.market, &f.ledger)
            .authorize(&p, &BTreeSet::new(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, EmporiaError::DelegationMismatch { .. }));
    }

    #[test]
    fn unknown_account_rejected() {
        let f = fixture();
        let (key, _) = holder_keypair();
        let ghost = AccountId::new();
        let mut p = program(&f, vec![delegation(&key, ghost, f.trader, &f.market)]);
        p.accounts = vec![ghost];
        let err = AuthorizationValidator::new(&f.market, &f.ledger)
            .authorize(&p, &BTreeSet::from([ghost]), Utc::now())
            .unwrap_err();
        assert!(matches!(err, EmporiaError::UnknownAccount(_)));
    }

    #[test]
    fn house_account_never_delegable() {
        let f = fixture();
        let house = f.ledger.house();
        let mut p = program(&f, vec![]);
        p.accounts = vec![house];
        let err = AuthorizationValidator::new(&f.market, &f.ledger)
            .authorize(&p, &BTreeSet::from([house]), Utc::now())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthError);
    }

    #[test]
    fn zero_holder_key_never_verifies() {
        let f = fixture();
        let d = delegation(&f.key, f.account, f.trader, &f.market);
        assert!(verify_delegation(&d, &[0u8; 32]).is_err());
    }
}
