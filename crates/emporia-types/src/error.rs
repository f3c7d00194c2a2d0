//! Error types for the Emporia round orchestrator.
//!
//! All errors use the `EM_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Round / phase errors
//! - 2xx: Authorization errors
//! - 3xx: Program errors
//! - 4xx: Ledger errors
//! - 5xx: Admission limit errors
//! - 9xx: General / internal errors
//!
//! Every error also maps onto a coarse [`ErrorKind`], which is what gets
//! recorded in program results and what the transport layer turns into a
//! response status.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{AccountId, EpochId, MarketName, ProgramId, RoundPhase, TraderId};

/// Central error enum for all Emporia operations.
#[derive(Debug, Error)]
pub enum EmporiaError {
    // =================================================================
    // Round Errors (1xx)
    // =================================================================
    /// A call was made outside the phase that accepts it.
    #[error("EM_ERR_100: {call} not accepted during {actual}")]
    WrongPhase { call: &'static str, actual: RoundPhase },

    /// LEAVE was called but no completed round is retained any more.
    #[error("EM_ERR_101: No round report retained for market {0}")]
    NoRetainedReport(MarketName),

    /// No market with this name is registered.
    #[error("EM_ERR_102: Unknown market: {0}")]
    UnknownMarket(MarketName),

    /// The market's scheduler is no longer running.
    #[error("EM_ERR_103: Market unavailable: {0}")]
    MarketUnavailable(MarketName),

    // =================================================================
    // Authorization Errors (2xx)
    // =================================================================
    /// The submitter did not ENTER this round.
    #[error("EM_ERR_200: {0} is not a participant of this round")]
    NotParticipant(TraderId),

    /// The program references an account without a matching delegation.
    #[error("EM_ERR_201: No delegation for {account}")]
    AccountNotDelegated { account: AccountId },

    /// The delegation for this account has expired.
    #[error("EM_ERR_202: Delegation for {account} expired")]
    DelegationExpired { account: AccountId },

    /// The delegation signature does not verify against the holder key.
    #[error("EM_ERR_203: Delegation signature for {account} is invalid")]
    DelegationSignatureInvalid { account: AccountId },

    /// The referenced account does not exist in the ledger.
    #[error("EM_ERR_204: Unknown account: {0}")]
    UnknownAccount(AccountId),

    /// The delegation exists but was issued for another trader or market.
    #[error("EM_ERR_205: Delegation for {account} does not apply: {reason}")]
    DelegationMismatch { account: AccountId, reason: String },

    // =================================================================
    // Program Errors (3xx)
    // =================================================================
    /// The program failed to compile.
    #[error("EM_ERR_300: Invalid program: {reason}")]
    InvalidProgram { reason: String },

    /// The program exhausted a bounded resource (fuel, stack, intents).
    #[error("EM_ERR_301: Resource exceeded: {resource} (limit {limit})")]
    ResourceExceeded { resource: String, limit: u64 },

    /// The program faulted at runtime.
    #[error("EM_ERR_302: Program fault: {reason}")]
    ProgramFault { reason: String },

    // =================================================================
    // Ledger Errors (4xx)
    // =================================================================
    /// Not enough balance of an asset at apply time.
    #[error("EM_ERR_400: Insufficient funds in {account}: {asset} need {needed}, have {available}")]
    InsufficientFunds {
        account: AccountId,
        asset: String,
        needed: Decimal,
        available: Decimal,
    },

    /// Not enough holdings of an item at apply time.
    #[error("EM_ERR_401: Insufficient holdings in {account}: {item} need {needed}, have {available}")]
    InsufficientHoldings {
        account: AccountId,
        item: String,
        needed: Decimal,
        available: Decimal,
    },

    /// An account with this ID already exists.
    #[error("EM_ERR_402: Account already exists: {0}")]
    AccountExists(AccountId),

    /// A quantity, price or amount was zero, negative or out of range.
    #[error("EM_ERR_403: Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// Funding operations are locked while the market is matching.
    #[error("EM_ERR_404: Ledger locked while matching")]
    LedgerLocked,

    // =================================================================
    // Admission Limit Errors (5xx)
    // =================================================================
    /// Too many programs in a single OFFER call.
    #[error("EM_ERR_500: Offer batch too large: {submitted} programs, max {max}")]
    BatchTooLarge { submitted: usize, max: usize },

    /// The trader has reached the per-round program limit.
    #[error("EM_ERR_501: {trader} reached the per-round program limit of {max}")]
    TooManyPrograms { trader: TraderId, max: usize },

    /// The round already has the maximum number of participants.
    #[error("EM_ERR_502: Participant limit of {max} reached")]
    ParticipantLimit { max: usize },

    /// Program source is larger than allowed.
    #[error("EM_ERR_503: Program code too large: {bytes} bytes, max {max}")]
    CodeTooLarge { bytes: usize, max: usize },

    /// Program claims more accounts than allowed.
    #[error("EM_ERR_504: Program references {count} accounts, max {max}")]
    TooManyAccounts { count: usize, max: usize },

    /// The round already holds the maximum number of programs.
    #[error("EM_ERR_505: Round is full: {max} programs")]
    RoundFull { max: usize },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("EM_ERR_900: Internal fault: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("EM_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config value, duplicate markets, etc.).
    #[error("EM_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// I/O error.
    #[error("EM_ERR_903: I/O error: {0}")]
    Io(String),

    /// Supply conservation invariant violated.
    #[error("EM_ERR_904: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },

    /// A program reached the matching engine twice.
    #[error("EM_ERR_905: Program already matched: {0}")]
    DuplicateProgram(ProgramId),

    /// A round was sealed for an epoch no newer than one already matched.
    #[error("EM_ERR_906: {epoch} already matched (last matched {last})")]
    EpochAlreadyMatched { epoch: EpochId, last: EpochId },
}

/// Coarse classification of an [`EmporiaError`].
///
/// Recorded in program results and mapped one-to-one onto a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    StateError,
    AuthError,
    InvalidProgram,
    ResourceExceeded,
    ProgramFault,
    InsufficientFunds,
    InsufficientHoldings,
    LimitExceeded,
    NotFound,
    Conflict,
    Unavailable,
    InternalFault,
}

impl ErrorKind {
    /// HTTP status the transport layer should answer with.
    #[must_use]
    pub fn status_code(self) -> u16 {
        match self {
            Self::StateError
            | Self::AuthError
            | Self::InvalidProgram
            | Self::ResourceExceeded
            | Self::ProgramFault
            | Self::InsufficientFunds
            | Self::InsufficientHoldings => 400,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::LimitExceeded => 429,
            Self::InternalFault => 500,
            Self::Unavailable => 503,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StateError => "StateError",
            Self::AuthError => "AuthError",
            Self::InvalidProgram => "InvalidProgram",
            Self::ResourceExceeded => "ResourceExceeded",
            Self::ProgramFault => "ProgramFault",
            Self::InsufficientFunds => "InsufficientFunds",
            Self::InsufficientHoldings => "InsufficientHoldings",
            Self::LimitExceeded => "LimitExceeded",
            Self::NotFound => "NotFound",
            Self::Conflict => "Conflict",
            Self::Unavailable => "Unavailable",
            Self::InternalFault => "InternalFault",
        };
        f.write_str(name)
    }
}

impl EmporiaError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::WrongPhase { .. } | Self::NoRetainedReport(_) | Self::LedgerLocked => {
                ErrorKind::StateError
            }
            Self::UnknownMarket(_) => ErrorKind::NotFound,
            Self::MarketUnavailable(_) => ErrorKind::Unavailable,
            Self::NotParticipant(_)
            | Self::AccountNotDelegated { .. }
            | Self::DelegationExpired { .. }
            | Self::DelegationSignatureInvalid { .. }
            | Self::UnknownAccount(_)
            | Self::DelegationMismatch { .. } => ErrorKind::AuthError,
            Self::InvalidProgram { .. } | Self::InvalidAmount { .. } => ErrorKind::InvalidProgram,
            Self::ResourceExceeded { .. } => ErrorKind::ResourceExceeded,
            Self::ProgramFault { .. } => ErrorKind::ProgramFault,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::InsufficientHoldings { .. } => ErrorKind::InsufficientHoldings,
            Self::BatchTooLarge { .. }
            | Self::TooManyPrograms { .. }
            | Self::ParticipantLimit { .. }
            | Self::CodeTooLarge { .. }
            | Self::TooManyAccounts { .. }
            | Self::RoundFull { .. } => ErrorKind::LimitExceeded,
            Self::AccountExists(_) => ErrorKind::Conflict,
            Self::Internal(_)
            | Self::Serialization(_)
            | Self::Configuration(_)
            | Self::Io(_)
            | Self::SupplyInvariantViolation { .. }
            | Self::DuplicateProgram(_)
            | Self::EpochAlreadyMatched { .. } => ErrorKind::InternalFault,
        }
    }

    /// Shorthand for `self.kind().status_code()`.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, EmporiaError>;

impl From<std::io::Error> for EmporiaError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for EmporiaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = EmporiaError::UnknownMarket(MarketName::new("M"));
        let msg = format!("{err}");
        assert!(msg.starts_with("EM_ERR_102"), "Got: {msg}");
    }

    #[test]
    fn wrong_phase_display() {
        let err = EmporiaError::WrongPhase {
            call: "ENTER",
            actual: RoundPhase::Matching,
        };
        let msg = format!("{err}");
        assert!(msg.contains("EM_ERR_100"));
        assert!(msg.contains("ENTER"));
        assert!(msg.contains("MATCHING"));
    }

    #[test]
    fn insufficient_holdings_display() {
        let err = EmporiaError::InsufficientHoldings {
            account: AccountId::new(),
            item: "X".into(),
            needed: Decimal::new(50, 0),
            available: Decimal::new(20, 0),
        };
        let msg = format!("{err}");
        assert!(msg.contains("EM_ERR_401"));
        assert!(msg.contains("50"));
        assert!(msg.contains("20"));
    }

    #[test]
    fn kinds_map_to_statuses() {
        let state = EmporiaError::WrongPhase {
            call: "OFFER",
            actual: RoundPhase::Entering,
        };
        assert_eq!(state.kind(), ErrorKind::StateError);
        assert_eq!(state.status_code(), 400);

        let auth = EmporiaError::NotParticipant(TraderId::new());
        assert_eq!(auth.kind(), ErrorKind::AuthError);
        assert_eq!(auth.status_code(), 400);

        assert_eq!(
            EmporiaError::UnknownMarket(MarketName::new("x")).status_code(),
            404
        );
        assert_eq!(EmporiaError::Internal("boom".into()).status_code(), 500);

        let taken = EmporiaError::AccountExists(AccountId::new());
        assert_eq!(taken.kind(), ErrorKind::Conflict);
        assert_eq!(taken.status_code(), 409);
    }

    #[test]
    fn all_errors_have_em_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(EmporiaError::LedgerLocked),
            Box::new(EmporiaError::NotParticipant(TraderId::new())),
            Box::new(EmporiaError::InvalidProgram {
                reason: "x".into(),
            }),
            Box::new(EmporiaError::Internal("test".into())),
            Box::new(EmporiaError::BatchTooLarge {
                submitted: 2,
                max: 1,
            }),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("EM_ERR_"),
                "Error missing EM_ERR_ prefix: {msg}"
            );
        }
    }

    #[test]
    fn error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::InsufficientHoldings).unwrap();
        assert_eq!(json, "\"insufficient_holdings\"");
        assert_eq!(
            format!("{}", ErrorKind::ResourceExceeded),
            "ResourceExceeded"
        );
    }
}
