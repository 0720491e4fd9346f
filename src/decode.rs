//! Operand decoding
//!
//! Splits a tokenized instruction (mnemonic already stripped off by the
//! caller) into register indices and an optional immediate, following the
//! shape of the token list:
//!
//! - 4 tokens `(op, a, b, c)`: `a` and `b` are register indices; `c` is a
//!   register index unless its first character is a digit or `-`, in which
//!   case it is a signed decimal immediate.
//! - 3 tokens `(op, a, b)`: both register indices.
//! - 2 tokens `(op, a)`: a single register index.
//! - any other shape: rejected.
//!
//! A register-index token looks like `<bank-letter><digits>` (e.g. `VR3`,
//! `SR0`); the first two characters are dropped and the remainder parsed as
//! a decimal index. This module does not itself enforce the `< 8` bound on
//! register indices (invariant I3); that check happens where the index is
//! actually used to access a register file, which is where the spec places
//! the corresponding `InvalidRegister` report.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected 2, 3, or 4 tokens in an instruction, got {0}")]
    InvalidOperands(usize),
    #[error("could not parse register index from token {0:?}")]
    MalformedRegister(String),
    #[error("could not parse immediate from token {0:?}")]
    MalformedImmediate(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegOrImm {
    Reg(usize),
    Imm(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operands {
    /// `(op, a, b, c)`: register `a`, register `b`, and `c` (register or
    /// immediate).
    Triple(usize, usize, RegOrImm),
    /// `(op, a, b)`: register `a`, register `b`.
    Pair(usize, usize),
    /// `(op, a)`: register `a`.
    Single(usize),
}

/// Parse a register-index token by dropping its two-character bank prefix
/// (e.g. `VR`, `SR`) and parsing the remainder as a decimal index.
fn parse_register(token: &str) -> Result<usize, DecodeError> {
    token
        .get(2..)
        .and_then(|digits| digits.parse::<usize>().ok())
        .ok_or_else(|| DecodeError::MalformedRegister(token.to_string()))
}

/// A token denotes an immediate iff its first character is an ASCII digit
/// or `-`; otherwise it denotes a register index.
fn looks_like_immediate(token: &str) -> bool {
    matches!(token.as_bytes().first(), Some(b) if b.is_ascii_digit() || *b == b'-')
}

fn parse_reg_or_imm(token: &str) -> Result<RegOrImm, DecodeError> {
    if looks_like_immediate(token) {
        token
            .parse::<i32>()
            .map(RegOrImm::Imm)
            .map_err(|_| DecodeError::MalformedImmediate(token.to_string()))
    } else {
        parse_register(token).map(RegOrImm::Reg)
    }
}

/// Decode the operand tokens of an instruction (the mnemonic itself, i.e.
/// `tokens[0]`, has already been consumed by the caller and is not passed
/// here).
pub fn decode_operands(operand_tokens: &[String]) -> Result<Operands, DecodeError> {
    match operand_tokens {
        [a, b, c] => {
            let a = parse_register(a)?;
            let b = parse_register(b)?;
            let c = parse_reg_or_imm(c)?;
            Ok(Operands::Triple(a, b, c))
        }
        [a, b] => {
            let a = parse_register(a)?;
            let b = parse_register(b)?;
            Ok(Operands::Pair(a, b))
        }
        [a] => {
            let a = parse_register(a)?;
            Ok(Operands::Single(a))
        }
        other => Err(DecodeError::InvalidOperands(other.len() + 1)),
    }
}
