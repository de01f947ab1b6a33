/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! The integer expression evaluator: labels, `EQU` constants,
//! and integer literals combined with `+`/`-`, optionally wrapped in
//! `HI:`/`LO:`. No precedence beyond left-to-right is needed because no
//! multiplicative operators appear in the surveyed sources.

use crate::ast::{HighLow, Operand};

use super::numeric::parse_numeric_literal;

/// One additive term: either a resolved integer or a symbol name (a label
/// or an `EQU` name — both live in the same symbol table).
#[derive(Debug, Clone, PartialEq)]
enum Term {
    Constant(i64),
    Symbol(String),
}

/// Parses one operand-expression token (already stripped of a leading `#`,
/// if any) into an `Operand::Immediate` or `Operand::LabelRef`.
///
/// Returns `Err` only for expressions this crate's deliberately-small
/// grammar doesn't support (more than one symbolic term) or that are
/// syntactically empty.
pub fn parse_expression(token: &str) -> Result<Operand, String> {
    let token = token.trim();
    if token.is_empty() {
        return Err("empty expression".to_string());
    }

    let (high_low, rest) = strip_hi_lo(token);
    let terms = split_additive_terms(rest)?;
    if terms.is_empty() {
        return Err(format!("could not parse expression {:?}", token));
    }

    let mut constant_sum: i64 = 0;
    let mut symbol: Option<String> = None;
    for (negative, term) in terms {
        match term {
            Term::Constant(v) => {
                constant_sum += if negative { -v } else { v };
            }
            Term::Symbol(name) => {
                if symbol.is_some() {
                    return Err(format!(
                        "expression {:?} combines more than one symbol; only a single label plus a constant offset is supported",
                        token
                    ));
                }
                if negative {
                    return Err(format!(
                        "expression {:?} negates a symbol, which is not supported",
                        token
                    ));
                }
                symbol = Some(name);
            }
        }
    }

    Ok(match symbol {
        Some(name) => Operand::LabelRef {
            name,
            offset: constant_sum,
            high_low,
        },
        None => Operand::Immediate {
            value: constant_sum,
            high_low,
        },
    })
}

fn strip_hi_lo(token: &str) -> (HighLow, &str) {
    let upper_prefix_len = token.chars().take_while(|c| c.is_ascii_alphabetic()).count();
    let (prefix, rest) = token.split_at(upper_prefix_len);
    match prefix.to_ascii_uppercase().as_str() {
        "HI" if rest.starts_with(':') => (HighLow::Hi, &rest[1..]),
        "LO" if rest.starts_with(':') => (HighLow::Lo, &rest[1..]),
        _ => (HighLow::None, token),
    }
}

/// Splits `rest` into signed terms on top-level `+`/`-`. A leading `-` is
/// treated as unary negation of the first term rather than a binary
/// operator. There is no bracket nesting to worry about in this grammar.
fn split_additive_terms(rest: &str) -> Result<Vec<(bool, Term)>, String> {
    let chars: Vec<char> = rest.trim().chars().collect();
    if chars.is_empty() {
        return Ok(Vec::new());
    }

    let mut terms = Vec::new();
    let mut i = 0;
    let mut pending_negative = false;
    if chars[0] == '-' {
        pending_negative = true;
        i = 1;
    } else if chars[0] == '+' {
        i = 1;
    }

    let mut start = i;
    while i < chars.len() {
        if (chars[i] == '+' || chars[i] == '-') && i > start {
            let raw: String = chars[start..i].iter().collect();
            terms.push((pending_negative, classify_term(raw.trim())?));
            pending_negative = chars[i] == '-';
            start = i + 1;
        }
        i += 1;
    }
    let raw: String = chars[start..].iter().collect();
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(format!("dangling operator in expression {:?}", rest));
    }
    terms.push((pending_negative, classify_term(raw)?));
    Ok(terms)
}

fn classify_term(raw: &str) -> Result<Term, String> {
    if let Some(value) = parse_numeric_literal(raw) {
        Ok(Term::Constant(value))
    } else if is_identifier(raw) {
        Ok(Term::Symbol(raw.to_string()))
    } else {
        Err(format!("not a valid label or number: {:?}", raw))
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '.' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Applies a `HI:`/`LO:` tag to a fully-resolved 32-bit value:
/// `HI:` takes bits `[31:16]`, `LO:` takes bits `[15:0]`, `None` passes the
/// full value through.
pub fn apply_high_low(value: i64, high_low: HighLow) -> i64 {
    match high_low {
        HighLow::None => value,
        HighLow::Hi => (value >> 16) & 0xFFFF,
        HighLow::Lo => value & 0xFFFF,
    }
}
