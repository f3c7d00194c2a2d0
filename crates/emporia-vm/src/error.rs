//! Compile and runtime errors of the interpreter.
//!
//! Both convert into [`EmporiaError`] so they can be recorded in a program's
//! result with the right [`ErrorKind`](emporia_types::ErrorKind).

use emporia_types::{AccountId, EmporiaError};
use thiserror::Error;

/// Why a program failed to compile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("unknown word `{0}`")]
    UnknownWord(String),

    #[error("unterminated {0}")]
    Unterminated(&'static str),

    #[error("`{word}` without matching `{expected}`")]
    Unbalanced {
        word: &'static str,
        expected: &'static str,
    },

    #[error("`:` inside a definition or control structure")]
    NestedDefinition,

    #[error("bad word name `{0}`")]
    BadName(String),

    #[error("number out of range: {0}")]
    BadNumber(String),
}

/// Why a running program was aborted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmFault {
    #[error("fuel exhausted")]
    OutOfFuel { limit: u64 },

    #[error("stack overflow")]
    StackOverflow { limit: usize },

    #[error("call depth exceeded")]
    CallDepth { limit: usize },

    #[error("too many intents")]
    TooManyIntents { limit: usize },

    #[error("stack underflow in `{0}`")]
    StackUnderflow(&'static str),

    #[error("`{op}` expects {expected}")]
    TypeMismatch {
        op: &'static str,
        expected: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("arithmetic overflow in `{0}`")]
    Overflow(&'static str),

    #[error("account index {index} out of range ({claimed} claimed)")]
    AccountIndex { index: String, claimed: usize },

    #[error("{0} is not in the ledger")]
    UnknownAccount(AccountId),

    #[error("invalid intent: {0}")]
    InvalidIntent(String),
}

impl From<CompileError> for EmporiaError {
    fn from(err: CompileError) -> Self {
        EmporiaError::InvalidProgram {
            reason: err.to_string(),
        }
    }
}

impl From<VmFault> for EmporiaError {
    fn from(fault: VmFault) -> Self {
        let (resource, limit) = match fault {
            VmFault::OutOfFuel { limit } => ("fuel", limit),
            VmFault::StackOverflow { limit } => ("stack", limit as u64),
            VmFault::CallDepth { limit } => ("call depth", limit as u64),
            VmFault::TooManyIntents { limit } => ("intents", limit as u64),
            other => {
                return EmporiaError::ProgramFault {
                    reason: other.to_string(),
                };
            }
        };
        EmporiaError::ResourceExceeded {
            resource: resource.to_string(),
            limit,
        }
    }
}
