//! # emporia-vm
//!
//! A small Forth-style interpreter for offer programs.
//!
//! Programs are compiled once at admission ([`compile`]) and executed during
//! matching ([`run`]). A running program can only:
//!
//! - read balances and holdings of the accounts it claims,
//! - emit buy/sell [`Intent`](emporia_types::Intent)s in order,
//! - write to a bounded screen buffer.
//!
//! Execution is deterministic and bounded by [`VmLimits`](emporia_types::VmLimits):
//! one unit of fuel per executed instruction, fixed stack and call depth,
//! a cap on intents and on screen bytes.

pub mod compile;
pub mod error;
pub mod machine;
pub mod screen;

pub use compile::{Code, compile};
pub use error::{CompileError, VmFault};
pub use machine::{Execution, Value, run};
pub use screen::{NoFilter, OutputFilter, Screen};
