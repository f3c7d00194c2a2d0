//! Offer programs and the delegations that authorize them.
//!
//! A trader submits [`ProgramSubmission`]s in an OFFER batch. Each one that is
//! admitted becomes a [`Program`] with a server-assigned ID and a position in
//! the round's total submission order.
//!
//! ## Delegation
//!
//! A program may only act for an account if it carries a [`Delegation`]
//! signed by that account's holder key, naming the submitting trader and the
//! market, and not yet expired.

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};

use crate::{AccountId, EpochId, MarketName, ProgramId, TraderId};

/// Proof that an account holder lets `delegate` act for `account`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub account: AccountId,
    pub delegate: TraderId,
    pub market: MarketName,
    pub expires_at: DateTime<Utc>,
    /// Ed25519 signature over [`Delegation::signing_payload`].
    pub signature: Vec<u8>,
}

impl Delegation {
    /// Canonical signing payload.
    ///
    /// Format: `"emporia:delegation:v1:" || account || delegate || len(market) || market || expires_at_ms`
    #[must_use]
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(96 + self.market.0.len());
        payload.extend_from_slice(b"emporia:delegation:v1:");
        payload.extend_from_slice(self.account.0.as_bytes());
        payload.extend_from_slice(self.delegate.0.as_bytes());
        payload.extend_from_slice(&(self.market.0.len() as u64).to_le_bytes());
        payload.extend_from_slice(self.market.0.as_bytes());
        payload.extend_from_slice(&self.expires_at.timestamp_millis().to_le_bytes());
        payload
    }

    /// Build and sign a delegation with the holder's signing key.
    #[must_use]
    pub fn sign(
        holder: &SigningKey,
        account: AccountId,
        delegate: TraderId,
        market: MarketName,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let mut delegation = Self {
            account,
            delegate,
            market,
            expires_at,
            signature: Vec::new(),
        };
        let signature = holder.sign(&delegation.signing_payload());
        delegation.signature = signature.to_bytes().to_vec();
        delegation
    }

    /// Returns `true` if the delegation has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A program as submitted in an OFFER batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramSubmission {
    /// Program source.
    pub code: String,
    /// Accounts the program acts for; `n acct` in the source picks the nth.
    pub accounts: Vec<AccountId>,
    /// One delegation per referenced account.
    pub delegations: Vec<Delegation>,
}

/// A program that has been assigned its place in a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    pub epoch: EpochId,
    /// Position in the round's submission order (unique, gap-free).
    pub sequence: u64,
    pub submitter: TraderId,
    pub code: String,
    pub accounts: Vec<AccountId>,
    pub delegations: Vec<Delegation>,
}

impl Program {
    /// Assign a submission its identity within a round.
    #[must_use]
    pub fn from_submission(
        market: &MarketName,
        epoch: EpochId,
        sequence: u64,
        submitter: TraderId,
        submission: ProgramSubmission,
    ) -> Self {
        Self {
            id: ProgramId::deterministic(market, epoch, sequence),
            epoch,
            sequence,
            submitter,
            code: submission.code,
            accounts: submission.accounts,
            delegations: submission.delegations,
        }
    }

    /// The delegation covering `account`, if the program carries one.
    #[must_use]
    pub fn delegation_for(&self, account: &AccountId) -> Option<&Delegation> {
        self.delegations.iter().find(|d| d.account == *account)
    }
}

/// Key and delegation helpers for tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use super::*;

    /// Fresh random holder keypair; returns the signing key and the raw
    /// verifying key bytes to register with the ledger.
    pub fn holder_keypair() -> (SigningKey, [u8; 32]) {
        let signing = SigningKey::generate(&mut rand::rngs::OsRng);
        let verifying = signing.verifying_key().to_bytes();
        (signing, verifying)
    }

    /// A delegation valid for one hour.
    pub fn delegation(
        holder: &SigningKey,
        account: AccountId,
        delegate: TraderId,
        market: &MarketName,
    ) -> Delegation {
        Delegation::sign(
            holder,
            account,
            delegate,
            market.clone(),
            Utc::now() + chrono::Duration::hours(1),
        )
    }

    /// A submission acting for a single account.
    pub fn submission(
        code: &str,
        holder: &SigningKey,
        account: AccountId,
        delegate: TraderId,
        market: &MarketName,
    ) -> ProgramSubmission {
        ProgramSubmission {
            code: code.to_string(),
            accounts: vec![account],
            delegations: vec![delegation(holder, account, delegate, market)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_helpers::*;
    use super::*;

    #[test]
    fn signing_payload_deterministic() {
        let (key, _) = holder_keypair();
        let d = delegation(&key, AccountId::new(), TraderId::new(), &MarketName::new("M"));
        assert_eq!(d.signing_payload(), d.signing_payload());
    }

    #[test]
    fn signing_payload_differs_by_market() {
        let (key, _) = holder_keypair();
        let d1 = delegation(&key, AccountId::new(), TraderId::new(), &MarketName::new("M"));
        let mut d2 = d1.clone();
        d2.market = MarketName::new("N");
        assert_ne!(d1.signing_payload(), d2.signing_payload());
    }

    #[test]
    fn signature_is_64_bytes() {
        let (key, _) = holder_keypair();
        let d = delegation(&key, AccountId::new(), TraderId::new(), &MarketName::new("M"));
        assert_eq!(d.signature.len(), 64);
    }

    #[test]
    fn expiry_check() {
        let (key, _) = holder_keypair();
        let d = delegation(&key, AccountId::new(), TraderId::new(), &MarketName::new("M"));
        assert!(!d.is_expired_at(Utc::now()));
        assert!(d.is_expired_at(Utc::now() + chrono::Duration::hours(2)));
    }

    #[test]
    fn from_submission_assigns_deterministic_id() {
        let (key, _) = holder_keypair();
        let market = MarketName::new("M");
        let trader = TraderId::new();
        let sub = submission("1 .", &key, AccountId::new(), trader, &market);
        let p = Program::from_submission(&market, EpochId(5), 3, trader, sub);
        assert_eq!(p.id, ProgramId::deterministic(&market, EpochId(5), 3));
        assert_eq!(p.sequence, 3);
        assert!(p.delegation_for(&p.accounts[0]).is_some());
        assert!(p.delegation_for(&AccountId::new()).is_none());
    }
}
