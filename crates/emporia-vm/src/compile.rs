//! Source → instruction compiler.
//!
//! Source is a whitespace-separated token stream. `( ... )` is a comment,
//! `"..."` a text literal that may contain spaces, `'word` a one-word text
//! literal. Everything else is a number or a word.
//!
//! User words (`: name ... ;`) are compiled into their own bodies and
//! called by index. A word is visible from the point it is defined on,
//! including inside its own body, so recursion works but forward
//! references do not.

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::CompileError;
use crate::machine::Value;

/// One compiled instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Push(Value),
    Dup,
    Drop,
    Swap,
    Over,
    Rot,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    Not,
    /// Jump within the current body when the popped flag is zero.
    JumpIfZero(usize),
    Jump(usize),
    /// Call a user word by body index.
    Call(usize),
    Exit,
    Acct,
    Balance,
    Holding,
    Buy,
    Sell,
    Print,
    Type,
    Cr,
    Halt,
}

/// A compiled program. Body 0 is the entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    pub bodies: Vec<Vec<Op>>,
}

impl Code {
    /// Total instruction count across all bodies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bodies.iter().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn builtin(word: &str) -> Option<Op> {
    let op = match word {
        "dup" => Op::Dup,
        "drop" => Op::Drop,
        "swap" => Op::Swap,
        "over" => Op::Over,
        "rot" => Op::Rot,
        "+" => Op::Add,
        "-" => Op::Sub,
        "*" => Op::Mul,
        "/" => Op::Div,
        "mod" => Op::Mod,
        "=" => Op::Eq,
        "<>" => Op::Ne,
        "<" => Op::Lt,
        ">" => Op::Gt,
        "<=" => Op::Le,
        ">=" => Op::Ge,
        "and" => Op::And,
        "or" => Op::Or,
        "not" => Op::Not,
        "exit" => Op::Exit,
        "acct" => Op::Acct,
        "balance" => Op::Balance,
        "holding" => Op::Holding,
        "buy" => Op::Buy,
        "sell" => Op::Sell,
        "." => Op::Print,
        "type" => Op::Type,
        "cr" => Op::Cr,
        "halt" => Op::Halt,
        _ => return None,
    };
    Some(op)
}

const CONTROL_WORDS: &[&str] = &[
    ":", ";", "if", "else", "then", "begin", "until", "again", "(", ")",
];

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'s> {
    Word(&'s str),
    Text(String),
}

fn tokenize(src: &str) -> Result<Vec<Token<'_>>, CompileError> {
    let mut tokens = Vec::new();
    let mut rest = src;
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return Ok(tokens);
        }
        if let Some(body) = rest.strip_prefix('"') {
            let end = body.find('"').ok_or(CompileError::Unterminated("text literal"))?;
            tokens.push(Token::Text(body[..end].to_string()));
            rest = &body[end + 1..];
            continue;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let word = &rest[..end];
        rest = &rest[end..];
        if word == "(" {
            let close = rest.find(')').ok_or(CompileError::Unterminated("comment"))?;
            rest = &rest[close + 1..];
        } else if let Some(text) = word.strip_prefix('\'') {
            tokens.push(Token::Text(text.to_string()));
        } else {
            tokens.push(Token::Word(word));
        }
    }
}

fn parse_number(word: &str) -> Option<Result<Decimal, CompileError>> {
    let digits = word.strip_prefix(['-', '+']).unwrap_or(word);
    if !digits.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    Some(Decimal::from_str(word).map_err(|_| CompileError::BadNumber(word.to_string())))
}

// ---------------------------------------------------------------------------
// Compiler
// ---------------------------------------------------------------------------

enum Ctrl {
    If(usize),
    Else(usize),
    Begin(usize),
}

struct Compiler {
    bodies: Vec<Vec<Op>>,
    words: HashMap<String, usize>,
    /// Body currently being filled.
    current: usize,
    control: Vec<Ctrl>,
}

impl Compiler {
    fn body(&mut self) -> &mut Vec<Op> {
        &mut self.bodies[self.current]
    }

    fn here(&self) -> usize {
        self.bodies[self.current].len()
    }

    fn patch(&mut self, at: usize, target: usize) {
        match &mut self.body()[at] {
            Op::JumpIfZero(t) | Op::Jump(t) => *t = target,
            _ => {}
        }
    }

    fn word(&mut self, word: &str, tokens: &mut std::slice::Iter<'_, Token<'_>>) -> Result<(), CompileError> {
        match word {
            ":" => {
                if self.current != 0 || !self.control.is_empty() {
                    return Err(CompileError::NestedDefinition);
                }
                let name = match tokens.next() {
                    Some(Token::Word(name)) => *name,
                    Some(Token::Text(text)) => return Err(CompileError::BadName(text.clone())),
                    None => return Err(CompileError::Unterminated("definition")),
                };
                if builtin(name).is_some()
                    || CONTROL_WORDS.contains(&name)
                    || parse_number(name).is_some()
                {
                    return Err(CompileError::BadName(name.to_string()));
                }
                self.bodies.push(Vec::new());
                self.current = self.bodies.len() - 1;
                self.words.insert(name.to_string(), self.current);
            }
            ";" => {
                if self.current == 0 {
                    return Err(CompileError::Unbalanced {
                        word: ";",
                        expected: ":",
                    });
                }
                if !self.control.is_empty() {
                    return Err(CompileError::Unterminated("control structure"));
                }
                self.current = 0;
            }
            "if" => {
                let at = self.here();
                self.body().push(Op::JumpIfZero(0));
                self.control.push(Ctrl::If(at));
            }
            "else" => {
                let Some(Ctrl::If(at)) = self.control.pop() else {
                    return Err(CompileError::Unbalanced {
                        word: "else",
                        expected: "if",
                    });
                };
                let jump = self.here();
                self.body().push(Op::Jump(0));
                let target = self.here();
                self.patch(at, target);
                self.control.push(Ctrl::Else(jump));
            }
            "then" => match self.control.pop() {
                Some(Ctrl::If(at) | Ctrl::Else(at)) => {
                    let target = self.here();
                    self.patch(at, target);
                }
                _ => {
                    return Err(CompileError::Unbalanced {
                        word: "then",
                        expected: "if",
                    });
                }
            },
            "begin" => {
                let at = self.here();
                self.control.push(Ctrl::Begin(at));
            }
            "until" | "again" => {
                let Some(Ctrl::Begin(start)) = self.control.pop() else {
                    return Err(CompileError::Unbalanced {
                        word: if word == "until" { "until" } else { "again" },
                        expected: "begin",
                    });
                };
                let op = if word == "until" {
                    Op::JumpIfZero(start)
                } else {
                    Op::Jump(start)
                };
                self.body().push(op);
            }
            ")" => {
                return Err(CompileError::Unbalanced {
                    word: ")",
                    expected: "(",
                });
            }
            _ => {
                let op = if let Some(number) = parse_number(word) {
                    Op::Push(Value::Num(number?))
                } else if let Some(&index) = self.words.get(word) {
                    Op::Call(index)
                } else if let Some(op) = builtin(word) {
                    op
                } else {
                    return Err(CompileError::UnknownWord(word.to_string()));
                };
                self.body().push(op);
            }
        }
        Ok(())
    }
}

/// Compile program source.
///
/// # Errors
/// Returns a [`CompileError`] for unknown words, unbalanced control
/// structures, unterminated literals or definitions, and bad numbers.
pub fn compile(src: &str) -> Result<Code, CompileError> {
    let tokens = tokenize(src)?;
    let mut compiler = Compiler {
        bodies: vec![Vec::new()],
        words: HashMap::new(),
        current: 0,
        control: Vec::new(),
    };
    let mut iter = tokens.iter();
    while let Some(token) = iter.next() {
        match token {
            Token::Text(text) => compiler.body().push(Op::Push(Value::Text(text.clone()))),
            Token::Word(word) => compiler.word(word, &mut iter)?,
        }
    }
    if compiler.current != 0 {
        return Err(CompileError::Unterminated("definition"));
    }
    if !compiler.control.is_empty() {
        return Err(CompileError::Unterminated("control structure"));
    }
    Ok(Code {
        bodies: compiler.bodies,
    })
}
