//! The interpreter loop.
//!
//! [`run`] executes one compiled program against a read-only
//! [`LedgerView`]. Nothing it does touches the ledger: intents are only
//! collected, in emission order, for the matching engine to apply later.

use std::fmt;

use emporia_types::{AccountId, Intent, IntentSide, LedgerView, VmLimits};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::compile::{Code, Op};
use crate::error::VmFault;
use crate::screen::{OutputFilter, Screen};

/// A stack cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Num(Decimal),
    Text(String),
    Account(AccountId),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{}", n.normalize()),
            Self::Text(t) => f.write_str(t),
            Self::Account(a) => write!(f, "{a}"),
        }
    }
}

/// Everything one run produced.
///
/// On a fault, `intents` and `screen` hold whatever was produced before
/// the fault; the engine keeps the screen and discards the intents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub intents: Vec<Intent>,
    pub screen: String,
    pub screen_truncated: bool,
    pub fuel_used: u64,
    pub fault: Option<VmFault>,
}

/// Run a compiled program.
///
/// `accounts` are the accounts the program claims; `n acct` pushes the
/// nth. Balance and holding reads go through `view`.
#[must_use]
pub fn run(
    code: &Code,
    accounts: &[AccountId],
    view: &dyn LedgerView,
    limits: &VmLimits,
    filter: &dyn OutputFilter,
) -> Execution {
    let mut machine = Machine {
        code,
        accounts,
        view,
        limits,
        stack: Vec::new(),
        frames: Vec::new(),
        fuel_used: 0,
        intents: Vec::new(),
        screen: Screen::new(limits.screen_bytes, filter),
    };
    let fault = machine.execute().err();
    if let Some(fault) = &fault {
        tracing::trace!(%fault, fuel_used = machine.fuel_used, "program faulted");
    }
    let (screen, screen_truncated) = machine.screen.finish();
    Execution {
        intents: machine.intents,
        screen,
        screen_truncated,
        fuel_used: machine.fuel_used,
        fault,
    }
}

struct Frame {
    body: usize,
    pc: usize,
}

struct Machine<'a> {
    code: &'a Code,
    accounts: &'a [AccountId],
    view: &'a dyn LedgerView,
    limits: &'a VmLimits,
    stack: Vec<Value>,
    frames: Vec<Frame>,
    fuel_used: u64,
    intents: Vec<Intent>,
    screen: Screen<'a>,
}

impl Machine<'_> {
    fn execute(&mut self) -> Result<(), VmFault> {
        let code = self.code;
        let mut body = 0;
        let mut pc = 0;
        loop {
            let Some(op) = code.bodies[body].get(pc) else {
                // Falling off the end of a body returns from it.
                match self.frames.pop() {
                    Some(frame) => {
                        body = frame.body;
                        pc = frame.pc;
                        continue;
                    }
                    None => return Ok(()),
                }
            };
            if self.fuel_used >= self.limits.fuel {
                return Err(VmFault::OutOfFuel {
                    limit: self.limits.fuel,
                });
            }
            self.fuel_used += 1;
            pc += 1;
            match op {
                Op::Jump(target) => pc = *target,
                Op::JumpIfZero(target) => {
                    if !self.pop_flag("if/until")? {
                        pc = *target;
                    }
                }
                Op::Call(index) => {
                    if self.frames.len() >= self.limits.max_call_depth {
                        return Err(VmFault::CallDepth {
                            limit: self.limits.max_call_depth,
                        });
                    }
                    self.frames.push(Frame { body, pc });
                    body = *index;
                    pc = 0;
                }
                Op::Exit => match self.frames.pop() {
                    Some(frame) => {
                        body = frame.body;
                        pc = frame.pc;
                    }
                    None => return Ok(()),
                },
                Op::Halt => return Ok(()),
                other => self.step(other)?,
            }
        }
    }

    #[allow(clippy::too_many_lines)]
    fn step(&mut self, op: &Op) -> Result<(), VmFault> {
        match op {
            Op::Push(value) => self.push(value.clone())?,
            Op::Dup => {
                let top = self.peek(0, "dup")?.clone();
                self.push(top)?;
            }
            Op::Drop => {
                self.pop("drop")?;
            }
            Op::Swap => {
                let b = self.pop("swap")?;
                let a = self.pop("swap")?;
                self.push(b)?;
                self.push(a)?;
            }
            Op::Over => {
                let second = self.peek(1, "over")?.clone();
                self.push(second)?;
            }
            Op::Rot => {
                let len = self.stack.len();
                if len < 3 {
                    return Err(VmFault::StackUnderflow("rot"));
                }
                let a = self.stack.remove(len - 3);
                self.stack.push(a);
            }
            Op::Add => self.arith("+", Decimal::checked_add)?,
            Op::Sub => self.arith("-", Decimal::checked_sub)?,
            Op::Mul => self.arith("*", Decimal::checked_mul)?,
            Op::Div => self.divide("/", Decimal::checked_div)?,
            Op::Mod => self.divide("mod", Decimal::checked_rem)?,
            Op::Eq => {
                let b = self.pop("=")?;
                let a = self.pop("=")?;
                self.push_flag(a == b)?;
            }
            Op::Ne => {
                let b = self.pop("<>")?;
                let a = self.pop("<>")?;
                self.push_flag(a != b)?;
            }
            Op::Lt => self.compare("<", |a, b| a < b)?,
            Op::Gt => self.compare(">", |a, b| a > b)?,
            Op::Le => self.compare("<=", |a, b| a <= b)?,
            Op::Ge => self.compare(">=", |a, b| a >= b)?,
            Op::And => {
                let b = self.pop_flag("and")?;
                let a = self.pop_flag("and")?;
                self.push_flag(a && b)?;
            }
            Op::Or => {
                let b = self.pop_flag("or")?;
                let a = self.pop_flag("or")?;
                self.push_flag(a || b)?;
            }
            Op::Not => {
                let a = self.pop_flag("not")?;
                self.push_flag(!a)?;
            }
            Op::Acct => {
                let n = self.pop_num("acct")?;
                let account = Some(n)
                    .filter(|n| n.fract().is_zero())
                    .and_then(|n| n.to_usize())
                    .and_then(|i| self.accounts.get(i))
                    .copied()
                    .ok_or_else(|| VmFault::AccountIndex {
                        index: n.to_string(),
                        claimed: self.accounts.len(),
                    })?;
                self.push(Value::Account(account))?;
            }
            Op::Balance => {
                let asset = self.pop_text("balance")?;
                let account = self.pop_account("balance")?;
                let value = self
                    .view
                    .get_balance(&account, &asset)
                    .ok_or(VmFault::UnknownAccount(account))?;
                self.push(Value::Num(value))?;
            }
            Op::Holding => {
                let item = self.pop_text("holding")?;
                let account = self.pop_account("holding")?;
                let value = self
                    .view
                    .get_holdings(&account, &item)
                    .ok_or(VmFault::UnknownAccount(account))?;
                self.push(Value::Num(value))?;
            }
            Op::Buy => self.emit(IntentSide::Buy, "buy")?,
            Op::Sell => self.emit(IntentSide::Sell, "sell")?,
            Op::Print => {
                let value = self.pop(".")?;
                self.screen.write(&format!("{value} "));
            }
            Op::Type => {
                let text = self.pop_text("type")?;
                self.screen.write(&text);
            }
            Op::Cr => self.screen.write("\n"),
            // Control flow is handled by the caller.
            Op::Jump(_) | Op::JumpIfZero(_) | Op::Call(_) | Op::Exit | Op::Halt => {}
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Stack helpers
    // -----------------------------------------------------------------

    fn push(&mut self, value: Value) -> Result<(), VmFault> {
        if self.stack.len() >= self.limits.max_stack {
            return Err(VmFault::StackOverflow {
                limit: self.limits.max_stack,
            });
        }
        self.stack.push(value);
        Ok(())
    }

    fn push_flag(&mut self, flag: bool) -> Result<(), VmFault> {
        self.push(Value::Num(if flag { Decimal::ONE } else { Decimal::ZERO }))
    }

    fn pop(&mut self, op: &'static str) -> Result<Value, VmFault> {
        self.stack.pop().ok_or(VmFault::StackUnderflow(op))
    }

    fn peek(&self, depth: usize, op: &'static str) -> Result<&Value, VmFault> {
        self.stack
            .len()
            .checked_sub(depth + 1)
            .and_then(|i| self.stack.get(i))
            .ok_or(VmFault::StackUnderflow(op))
    }

    fn pop_num(&mut self, op: &'static str) -> Result<Decimal, VmFault> {
        match self.pop(op)? {
            Value::Num(n) => Ok(n),
            _ => Err(VmFault::TypeMismatch {
                op,
                expected: "a number",
            }),
        }
    }

    fn pop_flag(&mut self, op: &'static str) -> Result<bool, VmFault> {
        Ok(!self.pop_num(op)?.is_zero())
    }

    fn pop_text(&mut self, op: &'static str) -> Result<String, VmFault> {
        match self.pop(op)? {
            Value::Text(t) => Ok(t),
            _ => Err(VmFault::TypeMismatch {
                op,
                expected: "text",
            }),
        }
    }

    fn pop_account(&mut self, op: &'static str) -> Result<AccountId, VmFault> {
        match self.pop(op)? {
            Value::Account(a) => Ok(a),
            _ => Err(VmFault::TypeMismatch {
                op,
                expected: "an account",
            }),
        }
    }

    fn arith(
        &mut self,
        op: &'static str,
        f: fn(Decimal, Decimal) -> Option<Decimal>,
    ) -> Result<(), VmFault> {
        let b = self.pop_num(op)?;
        let a = self.pop_num(op)?;
        let result = f(a, b).ok_or(VmFault::Overflow(op))?;
        self.push(Value::Num(result))
    }

    fn divide(
        &mut self,
        op: &'static str,
        f: fn(Decimal, Decimal) -> Option<Decimal>,
    ) -> Result<(), VmFault> {
        let b = self.pop_num(op)?;
        let a = self.pop_num(op)?;
        if b.is_zero() {
            return Err(VmFault::DivisionByZero);
        }
        let result = f(a, b).ok_or(VmFault::Overflow(op))?;
        self.push(Value::Num(result))
    }

    fn compare(&mut self, op: &'static str, f: fn(&Decimal, &Decimal) -> bool) -> Result<(), VmFault> {
        let b = self.pop_num(op)?;
        let a = self.pop_num(op)?;
        self.push_flag(f(&a, &b))
    }

    /// `( account 'item 'asset qty price -- )`
    fn emit(&mut self, side: IntentSide, op: &'static str) -> Result<(), VmFault> {
        let price = self.pop_num(op)?;
        let quantity = self.pop_num(op)?;
        let asset = self.pop_text(op)?;
        let item = self.pop_text(op)?;
        let account = self.pop_account(op)?;
        if quantity <= Decimal::ZERO {
            return Err(VmFault::InvalidIntent(format!(
                "quantity must be positive, got {quantity}"
            )));
        }
        if price <= Decimal::ZERO {
            return Err(VmFault::InvalidIntent(format!(
                "price must be positive, got {price}"
            )));
        }
        if item.is_empty() || asset.is_empty() {
            return Err(VmFault::InvalidIntent("empty item or asset name".into()));
        }
        if self.intents.len() >= self.limits.max_intents {
            return Err(VmFault::TooManyIntents {
                limit: self.limits.max_intents,
            });
        }
        let intent = Intent {
            account,
            side,
            item,
            asset,
            quantity,
            price,
        };
        if intent.notional().is_none() {
            return Err(VmFault::Overflow(op));
        }
        self.intents.push(intent);
        Ok(())
    }
}
